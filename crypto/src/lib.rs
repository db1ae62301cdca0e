//! Hashing primitives for the Concord confirmation engine.
//!
//! - **Blake2b-256** — transaction content hashes
//! - **Accumulated hash** — the running hash that chains every durable index

pub mod hash;

pub use hash::{
    accumulated_hash, blake2b_256, blake2b_256_multi, genesis_accumulated_hash, hash_transaction,
};
