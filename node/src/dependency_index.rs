//! Dependency index — transactions blocked on an address's balance.
//!
//! Each address maps to an insertion-ordered set of transaction hashes whose
//! balance admission failed against it. When a rollback frees balance on an
//! address, the hashes still waiting there are re-evaluated in the order they
//! were blocked.
//!
//! Every operation locks one address shard at a time; a hash is registered
//! under or released from each of its addresses independently.

use std::collections::HashSet;

use concord_types::{Address, TxHash};
use dashmap::DashMap;
use indexmap::IndexSet;

#[derive(Default)]
pub struct DependencyIndex {
    by_address: DashMap<Address, IndexSet<TxHash>>,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `hash` as blocked under every address in `addresses`.
    ///
    /// Re-registering keeps the original position in each address's queue.
    pub fn register(&self, hash: TxHash, addresses: &[Address]) {
        for address in addresses {
            self.by_address.entry(*address).or_default().insert(hash);
        }
    }

    /// Remove `hash` from every address in `addresses`.
    pub fn release(&self, hash: &TxHash, addresses: &[Address]) {
        for address in addresses {
            self.by_address.remove_if_mut(address, |_, waiting| {
                waiting.shift_remove(hash);
                waiting.is_empty()
            });
        }
    }

    /// Remove `hash` and collect every other hash still waiting on any of
    /// `addresses`, in per-address insertion order without duplicates.
    pub fn release_and_collect(&self, hash: &TxHash, addresses: &[Address]) -> Vec<TxHash> {
        let mut collected: IndexSet<TxHash> = IndexSet::new();
        for address in addresses {
            self.by_address.remove_if_mut(address, |_, waiting| {
                waiting.shift_remove(hash);
                collected.extend(waiting.iter().copied());
                waiting.is_empty()
            });
        }
        collected.into_iter().collect()
    }

    /// Hashes currently blocked under `address`, oldest first.
    pub fn blocked_under(&self, address: &Address) -> Vec<TxHash> {
        self.by_address
            .get(address)
            .map(|waiting| waiting.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_blocked(&self, hash: &TxHash) -> bool {
        self.by_address
            .iter()
            .any(|entry| entry.value().contains(hash))
    }

    /// Number of distinct blocked transactions across all addresses.
    pub fn blocked_count(&self) -> usize {
        let mut distinct: HashSet<TxHash> = HashSet::new();
        for entry in self.by_address.iter() {
            distinct.extend(entry.value().iter().copied());
        }
        distinct.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}
