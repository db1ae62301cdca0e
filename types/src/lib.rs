//! Fundamental types for the Concord confirmation engine.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! transaction hashes, addresses, signed amounts, timestamps, transactions with
//! their base transfers, DSP consensus results, and index-chain entries.

pub mod address;
pub mod amount;
pub mod dsp;
pub mod error;
pub mod hash;
pub mod index;
pub mod state;
pub mod time;
pub mod transaction;

pub use address::Address;
pub use amount::Amount;
pub use dsp::{DspConsensusResult, DspOutcome};
pub use error::ConcordError;
pub use hash::TxHash;
pub use index::{AccumulatedHash, TransactionIndexEntry};
pub use state::{BalanceState, ConsensusStage, TransactionStatus};
pub use time::Timestamp;
pub use transaction::{BaseTransfer, Transaction, TrustChainConsensus};
