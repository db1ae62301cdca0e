//! Recorded consensus scenarios replayed by the daemon.
//!
//! A scenario is a JSON document listing opening balances, the transactions
//! the node observes, and the consensus events in delivery order. Addresses
//! are 32-byte hex strings; transactions are referred to by a label and their
//! hashes are derived from their content.

use std::collections::HashMap;

use anyhow::{bail, Context};
use concord_node::ConsensusEvent;
use concord_types::{
    Address, Amount, BaseTransfer, DspConsensusResult, DspOutcome, Timestamp, Transaction, TxHash,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub balances: Vec<BalanceSpec>,
    pub transactions: Vec<TransactionSpec>,
    #[serde(default)]
    pub events: Vec<EventSpec>,
}

#[derive(Debug, Deserialize)]
pub struct BalanceSpec {
    pub address: String,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct TransactionSpec {
    pub label: String,
    #[serde(default)]
    pub created_at: u64,
    pub transfers: Vec<TransferSpec>,
}

/// A negative amount is a debit (input), a positive one a credit.
#[derive(Debug, Deserialize)]
pub struct TransferSpec {
    pub address: String,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventSpec {
    TrustChain {
        tx: String,
        time: u64,
        #[serde(default = "default_trust_score")]
        trust_score: f64,
    },
    Dsp {
        tx: String,
        index: u64,
        #[serde(default)]
        indexing_time: u64,
        outcome: OutcomeSpec,
    },
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeSpec {
    Confirmed,
    Rejected,
}

fn default_trust_score() -> f64 {
    100.0
}

/// A scenario resolved into engine types.
#[derive(Debug)]
pub struct Resolved {
    pub balances: Vec<(Address, Amount)>,
    /// Transactions in declaration order, with their labels.
    pub transactions: Vec<(String, Transaction)>,
    pub events: Vec<ConsensusEvent>,
}

impl Scenario {
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        serde_json::from_str(s).context("invalid scenario JSON")
    }

    pub fn resolve(&self) -> anyhow::Result<Resolved> {
        let balances = self
            .balances
            .iter()
            .map(|b| -> anyhow::Result<(Address, Amount)> {
                Ok((parse_address(&b.address)?, Amount::new(b.amount as i128)))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut labels: HashMap<&str, TxHash> = HashMap::new();
        let mut transactions = Vec::with_capacity(self.transactions.len());
        for spec in &self.transactions {
            let tx = spec.to_transaction()?;
            if labels.insert(spec.label.as_str(), tx.hash).is_some() {
                bail!("duplicate transaction label '{}'", spec.label);
            }
            transactions.push((spec.label.clone(), tx));
        }

        let lookup = |label: &str| {
            labels
                .get(label)
                .copied()
                .with_context(|| format!("event references unknown transaction '{label}'"))
        };
        let events = self
            .events
            .iter()
            .map(|event| -> anyhow::Result<ConsensusEvent> {
                Ok(match event {
                    EventSpec::TrustChain {
                        tx,
                        time,
                        trust_score,
                    } => ConsensusEvent::TrustChain {
                        hash: lookup(tx)?,
                        time: Timestamp::new(*time),
                        trust_score: *trust_score,
                    },
                    EventSpec::Dsp {
                        tx,
                        index,
                        indexing_time,
                        outcome,
                    } => ConsensusEvent::Dsp {
                        hash: lookup(tx)?,
                        result: DspConsensusResult {
                            index: *index,
                            indexing_time: Timestamp::new(*indexing_time),
                            outcome: match outcome {
                                OutcomeSpec::Confirmed => DspOutcome::Confirmed,
                                OutcomeSpec::Rejected => DspOutcome::Rejected,
                            },
                        },
                    },
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Resolved {
            balances,
            transactions,
            events,
        })
    }
}

impl TransactionSpec {
    fn to_transaction(&self) -> anyhow::Result<Transaction> {
        let transfers = self
            .transfers
            .iter()
            .map(|t| -> anyhow::Result<BaseTransfer> {
                let address = parse_address(&t.address)?;
                let amount = Amount::new(t.amount as i128);
                Ok(if amount.is_negative() {
                    BaseTransfer::input(address, -amount)
                } else {
                    BaseTransfer::output(address, amount)
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let created_at = Timestamp::new(self.created_at);
        let hash = concord_crypto::hash_transaction(&transfers, created_at);
        Transaction::new(hash, transfers, created_at)
            .with_context(|| format!("transaction '{}'", self.label))
    }
}

pub fn parse_address(s: &str) -> anyhow::Result<Address> {
    let bytes = hex::decode(s.trim_start_matches("0x"))
        .with_context(|| format!("address '{s}' is not hex"))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("address '{s}' must be 32 bytes"))?;
    Ok(Address::new(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const BOB: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn sample() -> String {
        format!(
            r#"{{
                "balances": [{{ "address": "{ALICE}", "amount": 10 }}],
                "transactions": [
                    {{ "label": "a", "created_at": 1, "transfers": [
                        {{ "address": "{ALICE}", "amount": -7 }},
                        {{ "address": "{BOB}", "amount": 7 }}
                    ]}}
                ],
                "events": [
                    {{ "type": "dsp", "tx": "a", "index": 0, "outcome": "confirmed" }},
                    {{ "type": "trust_chain", "tx": "a", "time": 5 }}
                ]
            }}"#
        )
    }

    #[test]
    fn resolves_labels_and_signs() {
        let resolved = Scenario::from_json(&sample()).unwrap().resolve().unwrap();
        assert_eq!(resolved.balances.len(), 1);

        let (label, tx) = &resolved.transactions[0];
        assert_eq!(label, "a");
        assert!(tx.base_transfers[0].input);
        assert_eq!(tx.base_transfers[0].amount, Amount::new(-7));
        assert!(!tx.base_transfers[1].input);

        assert_eq!(resolved.events.len(), 2);
        assert_eq!(resolved.events[0].hash(), &tx.hash);
        match &resolved.events[1] {
            ConsensusEvent::TrustChain { trust_score, .. } => assert_eq!(*trust_score, 100.0),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn unknown_label_is_an_error() {
        let json = sample().replace(r#""tx": "a", "time""#, r#""tx": "zz", "time""#);
        let err = Scenario::from_json(&json).unwrap().resolve().unwrap_err();
        assert!(err.to_string().contains("unknown transaction 'zz'"));
    }

    #[test]
    fn short_address_is_rejected() {
        assert!(parse_address("abcd").is_err());
        assert!(parse_address(&format!("0x{ALICE}")).is_ok());
    }
}
