//! Double-spend-prevention (DSP) consensus results.

use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Accept/reject outcome of a DSP vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DspOutcome {
    Confirmed,
    Rejected,
}

/// The DSP result attached (at most once) to a transaction.
///
/// `index` is the transaction's position in the global ordering; it is only
/// durable once the index chain has accepted it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DspConsensusResult {
    pub index: u64,
    pub indexing_time: Timestamp,
    pub outcome: DspOutcome,
}

impl DspConsensusResult {
    pub fn confirmed(index: u64, indexing_time: Timestamp) -> Self {
        Self {
            index,
            indexing_time,
            outcome: DspOutcome::Confirmed,
        }
    }

    pub fn rejected(index: u64, indexing_time: Timestamp) -> Self {
        Self {
            index,
            indexing_time,
            outcome: DspOutcome::Rejected,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.outcome == DspOutcome::Confirmed
    }
}
