//! Index-chain entries.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::hash::hex;
use crate::TxHash;

/// Running hash over `(previous, transaction hash, index)` for every durable index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccumulatedHash([u8; 32]);

impl AccumulatedHash {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for AccumulatedHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccumulatedHash({})", hex::encode(&self.0[..4]))
    }
}

/// Maps a durable index to its transaction and the chain value up to it.
///
/// Entries form a gapless run starting at 0.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionIndexEntry {
    pub index: u64,
    pub tx_hash: TxHash,
    pub accumulated_hash: AccumulatedHash,
}
