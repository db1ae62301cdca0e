//! Top-level error type shared across crates.

use thiserror::Error;

/// Common error type for the Concord types layer.
#[derive(Debug, Error)]
pub enum ConcordError {
    #[error("invalid transaction: {reason}")]
    InvalidTransaction { reason: String },

    #[error("amount overflow while summing transfers for {address}")]
    AmountOverflow { address: String },
}
