//! Concord confirmation engine.
//!
//! Reconciles the two consensus signals every transaction receives into one
//! monotonically sequenced ledger:
//! - Sequences DSP results into a gapless, hash-chained index
//! - Optimistically reserves balance effects and rolls them back on rejection
//! - Re-evaluates transactions blocked on addresses freed by a rollback
//! - Finalises transactions once trust-chain consensus and DSP confirmation meet
//! - Validates the persisted index chain from genesis on startup

pub mod admission;
pub mod balance;
pub mod config;
pub mod counters;
pub mod dependency_index;
pub mod error;
pub mod event;
pub mod hooks;
pub mod index_chain;
pub mod logging;
pub mod metrics;
pub mod reconciliation;
pub mod recovery;
pub mod sequence_buffer;
pub mod service;
pub mod shutdown;
pub mod tracing_spans;
pub mod transactions;
mod worker;

pub use admission::{AdmissionController, AdmissionOutcome};
pub use balance::{BalanceBook, BalanceLedger};
pub use config::EngineConfig;
pub use counters::{CountersSnapshot, EngineCounters};
pub use dependency_index::DependencyIndex;
pub use error::EngineError;
pub use event::ConsensusEvent;
pub use hooks::ConfirmationHooks;
pub use index_chain::{ChainCursor, IndexChain, InsertOutcome, SharedIndexStore};
pub use logging::{init_logging, LogFormat};
pub use metrics::EngineMetrics;
pub use reconciliation::{ConfirmationEngine, Observed};
pub use sequence_buffer::{BufferInsert, SequenceBuffer};
pub use service::ConfirmationService;
pub use shutdown::ShutdownController;
pub use transactions::{SharedTransactionStore, TransactionTable};
