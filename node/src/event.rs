//! Consensus events consumed by the worker.

use concord_types::{DspConsensusResult, Timestamp, TxHash};
use serde::{Deserialize, Serialize};

/// One consensus signal for one transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsensusEvent {
    TrustChain {
        hash: TxHash,
        time: Timestamp,
        trust_score: f64,
    },
    Dsp {
        hash: TxHash,
        result: DspConsensusResult,
    },
}

impl ConsensusEvent {
    pub fn hash(&self) -> &TxHash {
        match self {
            ConsensusEvent::TrustChain { hash, .. } | ConsensusEvent::Dsp { hash, .. } => hash,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ConsensusEvent::TrustChain { .. } => "trust_chain",
            ConsensusEvent::Dsp { .. } => "dsp",
        }
    }
}
