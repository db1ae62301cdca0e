//! Transaction storage trait.

use crate::StoreError;
use concord_types::{Transaction, TxHash};

/// Keyed storage of transaction records.
///
/// Implementations provide no locking of their own beyond what keeps a single
/// call atomic; per-transaction exclusivity is layered on top by the engine.
pub trait TransactionStore {
    /// Store (insert or overwrite) a transaction keyed by its hash.
    fn put_transaction(&self, tx: &Transaction) -> Result<(), StoreError>;

    /// Retrieve a transaction by hash.
    fn get_transaction(&self, hash: &TxHash) -> Result<Transaction, StoreError>;

    /// Check if a transaction exists.
    fn exists(&self, hash: &TxHash) -> Result<bool, StoreError>;

    fn transaction_count(&self) -> Result<u64, StoreError>;

    /// Every stored transaction, in no particular order.
    fn iter_transactions(&self) -> Result<Vec<Transaction>, StoreError>;
}
