//! Blake2b hashing for transactions and the index chain.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use concord_types::{AccumulatedHash, BaseTransfer, Timestamp, TxHash};

type Blake2b256 = Blake2b<U32>;

/// Seed of the accumulated-hash chain, hashed to form the value before index 0.
const GENESIS_SEED: &[u8] = b"GENESIS";

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Content hash of a transaction: its transfers in order, then its creation time.
pub fn hash_transaction(transfers: &[BaseTransfer], created_at: Timestamp) -> TxHash {
    let mut hasher = Blake2b256::new();
    for transfer in transfers {
        hasher.update(transfer.address.as_bytes());
        hasher.update(transfer.amount.raw().to_be_bytes());
        hasher.update([transfer.input as u8]);
    }
    hasher.update(created_at.as_millis().to_be_bytes());
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    TxHash::new(output)
}

/// The chain value that precedes index 0.
pub fn genesis_accumulated_hash() -> AccumulatedHash {
    AccumulatedHash::new(blake2b_256(GENESIS_SEED))
}

/// `H(previous, tx_hash, index)` — the next link of the index chain.
pub fn accumulated_hash(previous: &AccumulatedHash, tx_hash: &TxHash, index: u64) -> AccumulatedHash {
    AccumulatedHash::new(blake2b_256_multi(&[
        previous.as_bytes(),
        tx_hash.as_bytes(),
        &index.to_be_bytes(),
    ]))
}
