//! Sequence buffer — holds DSP results that arrived ahead of their predecessor.
//!
//! A DSP result can only be durably indexed once the index before it exists.
//! Results that arrive early are parked here keyed by their index and are
//! replayed, one contiguous index at a time, as the gap closes.
//!
//! Inserts and takes happen while the index chain cursor is held, so a result
//! is never buffered after its predecessor has already looked for it.

use concord_types::TxHash;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Result of parking a DSP result in the buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferInsert {
    Buffered,
    /// The same transaction was already waiting at this index.
    AlreadyBuffered,
    /// A different transaction already claims this index.
    Conflict { existing: TxHash },
}

/// Index → transaction map of DSP results waiting on a gap.
#[derive(Default)]
pub struct SequenceBuffer {
    waiting: DashMap<u64, TxHash>,
}

impl SequenceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `hash` at `index` until `index - 1` is durably inserted.
    pub fn insert(&self, index: u64, hash: TxHash) -> BufferInsert {
        match self.waiting.entry(index) {
            Entry::Occupied(existing) if *existing.get() == hash => BufferInsert::AlreadyBuffered,
            Entry::Occupied(existing) => BufferInsert::Conflict {
                existing: *existing.get(),
            },
            Entry::Vacant(slot) => {
                slot.insert(hash);
                BufferInsert::Buffered
            }
        }
    }

    /// Remove and return the transaction waiting at `index`, if any.
    pub fn take(&self, index: u64) -> Option<TxHash> {
        self.waiting.remove(&index).map(|(_, hash)| hash)
    }

    pub fn contains(&self, index: u64) -> bool {
        self.waiting.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    /// Buffered indices in ascending order.
    pub fn indices(&self) -> Vec<u64> {
        let mut indices: Vec<u64> = self.waiting.iter().map(|e| *e.key()).collect();
        indices.sort_unstable();
        indices
    }
}
