//! Nullable infrastructure for deterministic testing.
//!
//! In-memory implementations of the storage traits that never touch the
//! filesystem and can be inspected or corrupted programmatically. Used by
//! the engine's tests and by the daemon's scenario replays.

pub mod store;

pub use store::{NullIndexStore, NullTransactionStore};
