//! Balance and consensus state enums.

use serde::{Deserialize, Serialize};

/// Where a transaction's balance effects currently stand.
///
/// Replaces a single `valid` flag: only [`BalanceState::Reserved`] and
/// [`BalanceState::Applied`] mean the effects are in the pre-balance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BalanceState {
    /// Nothing reserved yet.
    #[default]
    Unreserved,
    /// Admission failed; parked in the dependency index until balance frees up.
    Blocked,
    /// Effects reserved in the pre-balance, awaiting finality.
    Reserved,
    /// Final: effects written to the confirmed balance.
    Applied,
    /// A reservation existed and was reversed after a DSP rejection.
    RolledBack,
}

impl BalanceState {
    /// Whether the transaction's effects are currently reserved or applied.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Reserved | Self::Applied)
    }
}

/// Conceptual reconciliation stage, derived from a transaction's fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsensusStage {
    Pending,
    TrustChainConfirmedOnly,
    /// A DSP result is attached but its index is not yet durable.
    DspPendingIndex,
    DspConfirmedOnly,
    /// DSP-rejected while the reservation is still in place.
    DspRejected,
    Confirmed,
    RejectedFinal,
}

/// Status reported to the address-history collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    Confirmed,
    Rejected,
}
