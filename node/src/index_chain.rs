//! Durable index chain with accumulated-hash integrity.
//!
//! Every DSP result is assigned a global index. Entries are inserted strictly
//! in order starting at 0, each carrying
//! `accumulated_hash = H(previous accumulated hash, tx hash, index)`.
//!
//! All inserts go through a [`ChainCursor`], which holds the chain's tail for
//! the duration of a check-and-insert so concurrent workers cannot interleave.

use std::sync::Arc;

use concord_store::{StoreError, TransactionIndexStore};
use concord_types::{AccumulatedHash, TransactionIndexEntry, TxHash};
use parking_lot::{Mutex, MutexGuard};

use crate::EngineError;

pub type SharedIndexStore = Arc<dyn TransactionIndexStore + Send + Sync>;

/// Result of asking the chain to insert at a given index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The entry is now durable.
    Accepted(TransactionIndexEntry),
    /// The requested index is ahead of the chain tail.
    Gap { expected: u64 },
    /// This exact transaction already occupies the requested index.
    AlreadyIndexed,
}

pub struct IndexChain {
    store: SharedIndexStore,
    tail: Mutex<Option<TransactionIndexEntry>>,
}

impl IndexChain {
    /// A chain positioned before index 0. Call [`IndexChain::set_checkpoint`]
    /// after validating persisted entries.
    pub fn new(store: SharedIndexStore) -> Self {
        Self {
            store,
            tail: Mutex::new(None),
        }
    }

    /// Take exclusive access to the chain tail.
    pub fn lock(&self) -> ChainCursor<'_> {
        ChainCursor {
            tail: self.tail.lock(),
            store: self.store.as_ref(),
        }
    }

    /// Reposition the tail, typically after startup validation.
    pub fn set_checkpoint(&self, last: Option<TransactionIndexEntry>) {
        *self.tail.lock() = last;
    }

    pub fn last_entry(&self) -> Option<TransactionIndexEntry> {
        self.tail.lock().clone()
    }

    pub fn last_index(&self) -> Option<u64> {
        self.tail.lock().as_ref().map(|e| e.index)
    }

    pub fn entry(&self, index: u64) -> Result<TransactionIndexEntry, StoreError> {
        self.store.get_index(index)
    }

    pub fn accumulated_hash(
        previous: &AccumulatedHash,
        tx_hash: &TxHash,
        index: u64,
    ) -> AccumulatedHash {
        concord_crypto::accumulated_hash(previous, tx_hash, index)
    }
}

/// Exclusive handle on the chain tail.
pub struct ChainCursor<'a> {
    tail: MutexGuard<'a, Option<TransactionIndexEntry>>,
    store: &'a (dyn TransactionIndexStore + Send + Sync),
}

impl ChainCursor<'_> {
    /// The only index [`ChainCursor::insert_next`] will accept.
    pub fn next_index(&self) -> u64 {
        self.tail.as_ref().map_or(0, |e| e.index + 1)
    }

    /// Insert `hash` at `index` if `index` is exactly the next slot.
    ///
    /// An index below the tail is fine when it already holds `hash`; any
    /// other transaction there is a protocol violation.
    pub fn insert_next(&mut self, hash: TxHash, index: u64) -> Result<InsertOutcome, EngineError> {
        let expected = self.next_index();
        if index > expected {
            return Ok(InsertOutcome::Gap { expected });
        }
        if index < expected {
            let existing = self.store.get_index(index)?;
            if existing.tx_hash == hash {
                return Ok(InsertOutcome::AlreadyIndexed);
            }
            return Err(EngineError::ProtocolViolation {
                hash,
                reason: format!("index {index} already belongs to {}", existing.tx_hash),
            });
        }

        let previous = self
            .tail
            .as_ref()
            .map_or_else(concord_crypto::genesis_accumulated_hash, |e| e.accumulated_hash);
        let entry = TransactionIndexEntry {
            index,
            tx_hash: hash,
            accumulated_hash: IndexChain::accumulated_hash(&previous, &hash, index),
        };
        self.store.put_index(&entry)?;
        *self.tail = Some(entry.clone());
        Ok(InsertOutcome::Accepted(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_nullables::NullIndexStore;

    fn hash(byte: u8) -> TxHash {
        TxHash::new([byte; 32])
    }

    fn chain() -> (Arc<NullIndexStore>, IndexChain) {
        let store = Arc::new(NullIndexStore::new());
        let chain = IndexChain::new(store.clone());
        (store, chain)
    }

    #[test]
    fn accepts_in_order_and_chains_hashes() {
        let (store, chain) = chain();
        let mut cursor = chain.lock();

        let first = match cursor.insert_next(hash(1), 0).unwrap() {
            InsertOutcome::Accepted(entry) => entry,
            other => panic!("expected accepted, got {other:?}"),
        };
        let second = match cursor.insert_next(hash(2), 1).unwrap() {
            InsertOutcome::Accepted(entry) => entry,
            other => panic!("expected accepted, got {other:?}"),
        };
        drop(cursor);

        let genesis = concord_crypto::genesis_accumulated_hash();
        assert_eq!(
            first.accumulated_hash,
            IndexChain::accumulated_hash(&genesis, &hash(1), 0)
        );
        assert_eq!(
            second.accumulated_hash,
            IndexChain::accumulated_hash(&first.accumulated_hash, &hash(2), 1)
        );
        assert_eq!(chain.last_index(), Some(1));
        assert_eq!(store.entries().len(), 2);
    }

    #[test]
    fn reports_gap_without_writing() {
        let (store, chain) = chain();
        let outcome = chain.lock().insert_next(hash(3), 2).unwrap();
        assert_eq!(outcome, InsertOutcome::Gap { expected: 0 });
        assert!(store.entries().is_empty());
    }

    #[test]
    fn reinserting_same_transaction_is_already_indexed() {
        let (_, chain) = chain();
        let mut cursor = chain.lock();
        cursor.insert_next(hash(1), 0).unwrap();
        assert_eq!(
            cursor.insert_next(hash(1), 0).unwrap(),
            InsertOutcome::AlreadyIndexed
        );
    }

    #[test]
    fn occupied_index_is_a_protocol_violation() {
        let (_, chain) = chain();
        let mut cursor = chain.lock();
        cursor.insert_next(hash(1), 0).unwrap();
        let result = cursor.insert_next(hash(2), 0);
        assert!(matches!(result, Err(EngineError::ProtocolViolation { .. })));
        assert_eq!(cursor.next_index(), 1);
    }
}
