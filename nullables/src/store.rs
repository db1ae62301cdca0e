//! Nullable stores — thread-safe in-memory storage for testing.

use concord_store::{StoreError, TransactionIndexStore, TransactionStore};
use concord_types::{Transaction, TransactionIndexEntry, TxHash};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// An in-memory transaction store.
/// Thread-safe for use with tokio's multi-threaded runtime.
pub struct NullTransactionStore {
    transactions: Mutex<HashMap<TxHash, Transaction>>,
}

impl NullTransactionStore {
    pub fn new() -> Self {
        Self {
            transactions: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for NullTransactionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionStore for NullTransactionStore {
    fn put_transaction(&self, tx: &Transaction) -> Result<(), StoreError> {
        self.transactions
            .lock()
            .unwrap()
            .insert(tx.hash, tx.clone());
        Ok(())
    }

    fn get_transaction(&self, hash: &TxHash) -> Result<Transaction, StoreError> {
        self.transactions
            .lock()
            .unwrap()
            .get(hash)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(hash.to_string()))
    }

    fn exists(&self, hash: &TxHash) -> Result<bool, StoreError> {
        Ok(self.transactions.lock().unwrap().contains_key(hash))
    }

    fn transaction_count(&self) -> Result<u64, StoreError> {
        Ok(self.transactions.lock().unwrap().len() as u64)
    }

    fn iter_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        Ok(self.transactions.lock().unwrap().values().cloned().collect())
    }
}

/// An in-memory index-chain store, ordered by index.
pub struct NullIndexStore {
    entries: Mutex<BTreeMap<u64, TransactionIndexEntry>>,
}

impl NullIndexStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Every stored entry in ascending index order.
    pub fn entries(&self) -> Vec<TransactionIndexEntry> {
        self.entries.lock().unwrap().values().cloned().collect()
    }

    /// Drop an entry, simulating a corrupted or truncated chain.
    pub fn remove_index(&self, index: u64) {
        self.entries.lock().unwrap().remove(&index);
    }
}

impl Default for NullIndexStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionIndexStore for NullIndexStore {
    fn put_index(&self, entry: &TransactionIndexEntry) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap()
            .insert(entry.index, entry.clone());
        Ok(())
    }

    fn get_index(&self, index: u64) -> Result<TransactionIndexEntry, StoreError> {
        self.entries
            .lock()
            .unwrap()
            .get(&index)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("index {index}")))
    }

    fn index_count(&self) -> Result<u64, StoreError> {
        Ok(self.entries.lock().unwrap().len() as u64)
    }

    fn max_index(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.entries.lock().unwrap().keys().next_back().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_types::{AccumulatedHash, Address, Amount, BaseTransfer, Timestamp};

    fn sample_tx(byte: u8) -> Transaction {
        Transaction::new(
            TxHash::new([byte; 32]),
            vec![BaseTransfer::output(Address::new([byte; 32]), Amount::new(1))],
            Timestamp::new(1),
        )
        .unwrap()
    }

    #[test]
    fn test_put_get_transaction() {
        let store = NullTransactionStore::new();
        let tx = sample_tx(1);
        store.put_transaction(&tx).unwrap();
        assert_eq!(store.get_transaction(&tx.hash).unwrap(), tx);
        assert!(store.exists(&tx.hash).unwrap());
        assert_eq!(store.transaction_count().unwrap(), 1);
    }

    #[test]
    fn test_transaction_not_found() {
        let store = NullTransactionStore::new();
        let result = store.get_transaction(&TxHash::new([9; 32]));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_index_store_tracks_max() {
        let store = NullIndexStore::new();
        assert_eq!(store.max_index().unwrap(), None);
        for index in [2u64, 0, 1] {
            store
                .put_index(&TransactionIndexEntry {
                    index,
                    tx_hash: TxHash::new([index as u8; 32]),
                    accumulated_hash: AccumulatedHash::new([0; 32]),
                })
                .unwrap();
        }
        assert_eq!(store.max_index().unwrap(), Some(2));
        assert_eq!(store.index_count().unwrap(), 3);
        let indices: Vec<u64> = store.entries().iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);

        store.remove_index(1);
        assert!(store.get_index(1).is_err());
    }
}
