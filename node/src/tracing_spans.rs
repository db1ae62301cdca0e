//! Pre-built [`tracing::Span`] constructors for the engine's hot paths.
//!
//! Consistent span names and field sets make it easy to filter and correlate
//! one transaction's events, replays and cascades in any tracing backend.

use concord_types::TxHash;
use tracing::{info_span, Span};

/// Span covering one consensus event handled by a worker.
pub fn event_span(kind: &'static str, hash: &TxHash) -> Span {
    info_span!("consensus_event", kind = kind, hash = %hash)
}

/// Span covering the replay of a buffered DSP result whose predecessor landed.
pub fn replay_span(hash: &TxHash) -> Span {
    info_span!("index_replay", hash = %hash)
}

/// Span covering the re-admission of a transaction freed by a rollback.
pub fn cascade_span(hash: &TxHash) -> Span {
    info_span!("cascade", hash = %hash)
}

/// Span covering the startup walk over the index chain.
pub fn chain_validation_span(max_index: Option<u64>) -> Span {
    info_span!("chain_validation", max_index = ?max_index)
}
