//! Property tests: index gaplessness under arbitrary delivery order and
//! balance conservation under rollback cascades.

mod common;

use common::{spend, Fixture};
use concord_types::{Amount, BalanceState, DspConsensusResult, Timestamp};
use proptest::prelude::*;

fn permutation(max_len: usize) -> impl Strategy<Value = Vec<usize>> {
    (1..=max_len).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn any_delivery_order_yields_a_gapless_chain(
        order in permutation(24),
        redeliver in proptest::collection::vec(any::<bool>(), 24),
    ) {
        let f = Fixture::ready(1_000_000);
        let txs: Vec<_> = (0..order.len()).map(|i| spend(i as u16, 1)).collect();
        for tx in &txs {
            f.engine.insert_new_transaction(tx.clone()).unwrap();
        }

        for (step, &i) in order.iter().enumerate() {
            let result = DspConsensusResult::confirmed(i as u64, Timestamp::new(i as u64));
            f.engine.handle_dsp(&txs[i].hash, result.clone()).unwrap();
            if redeliver[step] {
                prop_assert!(f.engine.handle_dsp(&txs[i].hash, result).is_err());
            }
        }

        let entries = f.index_store.entries();
        prop_assert_eq!(entries.len(), txs.len());
        let mut previous = concord_crypto::genesis_accumulated_hash();
        for (i, entry) in entries.iter().enumerate() {
            prop_assert_eq!(entry.index, i as u64);
            prop_assert_eq!(entry.tx_hash, txs[i].hash);
            let expected = concord_crypto::accumulated_hash(&previous, &entry.tx_hash, entry.index);
            prop_assert_eq!(entry.accumulated_hash, expected);
            previous = expected;
        }
        prop_assert!(f.engine.buffered_indices().is_empty());
        prop_assert_eq!(f.engine.counters().dsp_confirmed, txs.len() as u64);
    }

    #[test]
    fn reserved_spends_never_exceed_available_balance(
        balance in 0i128..60,
        spends in proptest::collection::vec((1i128..25, any::<bool>()), 1..10),
        order_seed in any::<u64>(),
    ) {
        let f = Fixture::ready(balance);
        let txs: Vec<_> = spends
            .iter()
            .enumerate()
            .map(|(i, (amount, _))| spend(i as u16, *amount))
            .collect();
        for tx in &txs {
            f.engine.insert_new_transaction(tx.clone()).unwrap();
        }

        // Deterministic shuffle of delivery order from the seed.
        let mut order: Vec<usize> = (0..txs.len()).collect();
        let mut state = order_seed | 1;
        for i in (1..order.len()).rev() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            order.swap(i, (state % (i as u64 + 1)) as usize);
        }

        for &i in &order {
            let (_, reject) = spends[i];
            let result = if reject {
                DspConsensusResult::rejected(i as u64, Timestamp::new(i as u64))
            } else {
                DspConsensusResult::confirmed(i as u64, Timestamp::new(i as u64))
            };
            f.engine.handle_dsp(&txs[i].hash, result).unwrap();
        }

        let mut reserved = Amount::ZERO;
        let mut blocked = Vec::new();
        for (i, tx) in txs.iter().enumerate() {
            let stored = f.engine.transaction(&tx.hash).unwrap();
            prop_assert!(stored.indexed);
            let (amount, reject) = spends[i];
            if reject {
                prop_assert!(!stored.is_valid());
            } else if stored.is_valid() {
                reserved += Amount::new(amount);
            } else {
                prop_assert_eq!(stored.balance, BalanceState::Blocked);
                blocked.push(amount);
            }
        }

        let remaining = f.source_pre_balance();
        prop_assert!(reserved <= Amount::new(balance));
        prop_assert_eq!(remaining, Amount::new(balance) - reserved);
        // Anything still blocked genuinely does not fit.
        for amount in blocked {
            prop_assert!(Amount::new(amount) > remaining);
        }
    }
}
