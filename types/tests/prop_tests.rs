use proptest::prelude::*;

use concord_types::{
    Address, Amount, BaseTransfer, DspConsensusResult, Timestamp, Transaction, TxHash,
};

proptest! {
    /// TxHash roundtrip: new -> as_bytes -> new produces identical hash.
    #[test]
    fn tx_hash_roundtrip(bytes in prop::array::uniform32(0u8..)) {
        let hash = TxHash::new(bytes);
        prop_assert_eq!(hash.as_bytes(), &bytes);
    }

    /// TxHash::is_zero is true only for all-zero bytes.
    #[test]
    fn tx_hash_is_zero_correct(bytes in prop::array::uniform32(0u8..)) {
        let hash = TxHash::new(bytes);
        prop_assert_eq!(hash.is_zero(), bytes == [0u8; 32]);
    }

    /// Sharding always lands inside the shard range.
    #[test]
    fn tx_hash_shard_in_range(bytes in prop::array::uniform32(0u8..), shards in 1usize..64) {
        prop_assert!(TxHash::new(bytes).shard(shards) < shards);
    }

    /// Timestamp ordering: new(a) <= new(b) iff a <= b.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let ta = Timestamp::new(a);
        let tb = Timestamp::new(b);
        prop_assert_eq!(ta <= tb, a <= b);
        prop_assert_eq!(ta == tb, a == b);
    }

    /// Consensus time is the later of the two signal times.
    #[test]
    fn consensus_time_is_max(tcc in 0u64..1_000_000, dsp in 0u64..1_000_000) {
        let mut tx = Transaction::new(
            TxHash::new([9; 32]),
            vec![BaseTransfer::output(Address::new([1; 32]), Amount::new(1))],
            Timestamp::EPOCH,
        ).unwrap();
        tx.trust_chain = Some(concord_types::TrustChainConsensus {
            time: Timestamp::new(tcc),
            trust_score: 1.0,
        });
        tx.dsp_result = Some(DspConsensusResult::confirmed(0, Timestamp::new(dsp)));
        prop_assert_eq!(tx.consensus_time(), Some(Timestamp::new(tcc.max(dsp))));
    }

    /// Amount addition matches i128 addition when it does not overflow.
    #[test]
    fn amount_add_matches_raw(a in -1_000_000_000i128..1_000_000_000, b in -1_000_000_000i128..1_000_000_000) {
        prop_assert_eq!((Amount::new(a) + Amount::new(b)).raw(), a + b);
    }
}

#[test]
fn transaction_serde_roundtrip_preserves_state() {
    let mut tx = Transaction::new(
        TxHash::new([3; 32]),
        vec![
            BaseTransfer::input(Address::new([1; 32]), Amount::new(4)),
            BaseTransfer::output(Address::new([2; 32]), Amount::new(4)),
        ],
        Timestamp::new(1_000),
    )
    .unwrap();
    tx.dsp_result = Some(DspConsensusResult::rejected(12, Timestamp::new(2_000)));

    let encoded = bincode::serialize(&tx).unwrap();
    let decoded: Transaction = bincode::deserialize(&encoded).unwrap();
    assert_eq!(decoded, tx);

    let json = serde_json::to_string(&tx).unwrap();
    let decoded: Transaction = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, tx);
}
