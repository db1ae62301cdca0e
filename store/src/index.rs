//! Index-chain storage trait.

use crate::StoreError;
use concord_types::TransactionIndexEntry;

/// Durable storage of index-chain entries keyed by index.
pub trait TransactionIndexStore {
    fn put_index(&self, entry: &TransactionIndexEntry) -> Result<(), StoreError>;

    /// Retrieve the entry at `index`, or [`StoreError::NotFound`].
    fn get_index(&self, index: u64) -> Result<TransactionIndexEntry, StoreError>;

    fn index_count(&self) -> Result<u64, StoreError>;

    /// Highest stored index, if any.
    fn max_index(&self) -> Result<Option<u64>, StoreError>;
}
