//! Abstract storage traits for the Concord confirmation engine.
//!
//! Every storage backend (in-memory for testing, a key-value engine in
//! production) implements these traits. The engine depends only on the traits.

pub mod error;
pub mod index;
pub mod transaction;

pub use error::StoreError;
pub use index::TransactionIndexStore;
pub use transaction::TransactionStore;
