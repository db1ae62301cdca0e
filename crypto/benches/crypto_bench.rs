use criterion::{black_box, criterion_group, criterion_main, Criterion};
use concord_types::{Address, Amount, BaseTransfer, Timestamp, TxHash};

fn blake2b_256_bench(c: &mut Criterion) {
    let data = [0xABu8; 256];

    c.bench_function("blake2b_256_256B", |b| {
        b.iter(|| concord_crypto::blake2b_256(black_box(&data)))
    });
}

fn blake2b_multi_bench(c: &mut Criterion) {
    let parts: Vec<&[u8]> = vec![&[1u8; 32], &[2u8; 64], &[3u8; 128]];

    c.bench_function("blake2b_256_multi_3parts", |b| {
        b.iter(|| concord_crypto::blake2b_256_multi(black_box(&parts)))
    });
}

fn hash_transaction_bench(c: &mut Criterion) {
    let transfers: Vec<BaseTransfer> = (0..8u8)
        .map(|i| {
            if i % 2 == 0 {
                BaseTransfer::input(Address::new([i; 32]), Amount::new(100))
            } else {
                BaseTransfer::output(Address::new([i; 32]), Amount::new(100))
            }
        })
        .collect();
    let created_at = Timestamp::new(1_700_000_000_000);

    c.bench_function("hash_transaction_8_transfers", |b| {
        b.iter(|| concord_crypto::hash_transaction(black_box(&transfers), created_at))
    });
}

fn accumulated_chain_bench(c: &mut Criterion) {
    let hashes: Vec<TxHash> = (0..1_000u32)
        .map(|i| TxHash::new(concord_crypto::blake2b_256(&i.to_be_bytes())))
        .collect();

    c.bench_function("accumulated_hash_chain_1000", |b| {
        b.iter(|| {
            let mut acc = concord_crypto::genesis_accumulated_hash();
            for (index, hash) in hashes.iter().enumerate() {
                acc = concord_crypto::accumulated_hash(&acc, hash, index as u64);
            }
            acc
        })
    });
}

criterion_group!(
    benches,
    blake2b_256_bench,
    blake2b_multi_bench,
    hash_transaction_bench,
    accumulated_chain_bench,
);
criterion_main!(benches);
