//! Transactions and their base transfers.

use serde::{Deserialize, Serialize};

use crate::{
    Address, Amount, BalanceState, ConcordError, ConsensusStage, DspConsensusResult, Timestamp,
    TxHash,
};

/// One signed movement of value against one address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseTransfer {
    pub address: Address,
    /// Negative for a debit, positive for a credit.
    pub amount: Amount,
    /// Whether this transfer was created as an input (debit) of the transaction.
    pub input: bool,
}

impl BaseTransfer {
    /// A debit of `amount` (given as a positive value) from `address`.
    pub fn input(address: Address, amount: Amount) -> Self {
        Self {
            address,
            amount: -amount,
            input: true,
        }
    }

    /// A credit of `amount` to `address`.
    pub fn output(address: Address, amount: Amount) -> Self {
        Self {
            address,
            amount,
            input: false,
        }
    }
}

/// Trust-chain consensus signal as recorded on a transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrustChainConsensus {
    pub time: Timestamp,
    pub trust_score: f64,
}

/// A transaction as tracked by the confirmation engine.
///
/// Mutated only while holding its exclusive lock; never deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: TxHash,
    pub base_transfers: Vec<BaseTransfer>,
    pub created_at: Timestamp,
    pub balance: BalanceState,
    pub trust_chain: Option<TrustChainConsensus>,
    pub dsp_result: Option<DspConsensusResult>,
    /// Whether `dsp_result.index` has been durably inserted into the index chain.
    #[serde(default)]
    pub indexed: bool,
    /// Later of the trust-chain and DSP indexing times, set once either finalises.
    pub consensus_update_time: Option<Timestamp>,
}

impl Transaction {
    /// Build a fresh, unreserved transaction.
    ///
    /// Rejects transactions without transfers and transfers whose sign does
    /// not match their input flag.
    pub fn new(
        hash: TxHash,
        base_transfers: Vec<BaseTransfer>,
        created_at: Timestamp,
    ) -> Result<Self, ConcordError> {
        if base_transfers.is_empty() {
            return Err(ConcordError::InvalidTransaction {
                reason: format!("transaction {hash} has no base transfers"),
            });
        }
        if let Some(bad) = base_transfers
            .iter()
            .find(|t| t.input != t.amount.is_negative())
        {
            return Err(ConcordError::InvalidTransaction {
                reason: format!(
                    "transfer on {} has amount {} but input = {}",
                    bad.address, bad.amount, bad.input
                ),
            });
        }
        Ok(Self {
            hash,
            base_transfers,
            created_at,
            balance: BalanceState::Unreserved,
            trust_chain: None,
            dsp_result: None,
            indexed: false,
            consensus_update_time: None,
        })
    }

    /// Transfers that debit an address.
    pub fn inputs(&self) -> impl Iterator<Item = &BaseTransfer> {
        self.base_transfers.iter().filter(|t| t.input)
    }

    /// Distinct input addresses, in first-seen order.
    pub fn input_addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = Vec::new();
        for transfer in self.inputs() {
            if !addresses.contains(&transfer.address) {
                addresses.push(transfer.address);
            }
        }
        addresses
    }

    pub fn is_valid(&self) -> bool {
        self.balance.is_valid()
    }

    pub fn has_trust_chain_consensus(&self) -> bool {
        self.trust_chain.is_some()
    }

    /// DSP-confirmed and durably indexed.
    pub fn is_dsp_confirmed(&self) -> bool {
        self.indexed && self.dsp_result.as_ref().is_some_and(|r| r.is_confirmed())
    }

    /// DSP-rejected and durably indexed.
    pub fn is_dsp_rejected(&self) -> bool {
        self.indexed && self.dsp_result.as_ref().is_some_and(|r| !r.is_confirmed())
    }

    /// Both consensus signals are present and the effects are final.
    pub fn is_confirmed(&self) -> bool {
        self.has_trust_chain_consensus()
            && self.is_dsp_confirmed()
            && self.balance == BalanceState::Applied
    }

    /// Later of the trust-chain consensus time and the DSP indexing time.
    pub fn consensus_time(&self) -> Option<Timestamp> {
        let tcc = self.trust_chain.as_ref().map(|t| t.time);
        let dsp = self.dsp_result.as_ref().map(|r| r.indexing_time);
        tcc.max(dsp)
    }

    /// Derive the reconciliation stage from the stored fields.
    pub fn stage(&self) -> ConsensusStage {
        match &self.dsp_result {
            None if self.has_trust_chain_consensus() => ConsensusStage::TrustChainConfirmedOnly,
            None => ConsensusStage::Pending,
            Some(_) if !self.indexed => ConsensusStage::DspPendingIndex,
            Some(result) if result.is_confirmed() => {
                if self.is_confirmed() {
                    ConsensusStage::Confirmed
                } else {
                    ConsensusStage::DspConfirmedOnly
                }
            }
            Some(_) if self.is_valid() => ConsensusStage::DspRejected,
            Some(_) => ConsensusStage::RejectedFinal,
        }
    }
}
