//! Lock-scoped access to transaction records.
//!
//! Every mutation of a transaction happens inside [`TransactionTable::lock_and_mutate`],
//! which holds that hash's exclusive lock for the duration of the closure.
//! Locks are per hash: callers must never hold one while acquiring another.

use std::sync::Arc;

use concord_store::{StoreError, TransactionStore};
use concord_types::{Transaction, TxHash};
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::EngineError;

pub type SharedTransactionStore = Arc<dyn TransactionStore + Send + Sync>;

pub struct TransactionTable {
    store: SharedTransactionStore,
    locks: DashMap<TxHash, Arc<Mutex<()>>>,
}

impl TransactionTable {
    pub fn new(store: SharedTransactionStore) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    /// Run `f` on the stored record for `hash` under its exclusive lock.
    ///
    /// The record is written back only when `f` succeeds and changed it; an
    /// error leaves the stored record untouched.
    pub fn lock_and_mutate<R>(
        &self,
        hash: &TxHash,
        f: impl FnOnce(&mut Transaction) -> Result<R, EngineError>,
    ) -> Result<R, EngineError> {
        self.with_lock(hash, || {
            let mut tx = self.get(hash)?;
            let before = tx.clone();
            let result = f(&mut tx)?;
            if tx != before {
                self.store.put_transaction(&tx)?;
            }
            Ok(result)
        })
    }

    /// Store `tx` unless its hash is already known, running `prepare` on it
    /// first. Returns `false` for a duplicate.
    pub fn insert_if_absent(
        &self,
        mut tx: Transaction,
        prepare: impl FnOnce(&mut Transaction),
    ) -> Result<bool, EngineError> {
        let hash = tx.hash;
        self.with_lock(&hash, || {
            if self.store.exists(&hash)? {
                return Ok(false);
            }
            prepare(&mut tx);
            self.store.put_transaction(&tx)?;
            Ok(true)
        })
    }

    /// Store `tx`, overwriting any existing record, under its lock.
    pub fn put(&self, tx: &Transaction) -> Result<(), EngineError> {
        self.with_lock(&tx.hash, || Ok(self.store.put_transaction(tx)?))
    }

    /// Unlocked read of the current record.
    pub fn get(&self, hash: &TxHash) -> Result<Transaction, EngineError> {
        match self.store.get_transaction(hash) {
            Ok(tx) => Ok(tx),
            Err(StoreError::NotFound(_)) => Err(EngineError::UnknownTransaction(*hash)),
            Err(e) => Err(e.into()),
        }
    }

    pub fn exists(&self, hash: &TxHash) -> Result<bool, EngineError> {
        Ok(self.store.exists(hash)?)
    }

    fn with_lock<R>(
        &self,
        hash: &TxHash,
        f: impl FnOnce() -> Result<R, EngineError>,
    ) -> Result<R, EngineError> {
        let lock = Arc::clone(self.locks.entry(*hash).or_default().value());
        let result = {
            let _guard = lock.lock();
            f()
        };
        drop(lock);
        // Only the map still holds it: nobody is waiting on this hash.
        self.locks
            .remove_if(hash, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    /// Number of hashes with a live lock entry.
    pub fn held_locks(&self) -> usize {
        self.locks.len()
    }
}
