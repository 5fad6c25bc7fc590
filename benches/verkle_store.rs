//! Verkle Store Performance Benchmarks
//!
//! Benchmarks for the write path, commit sealing, and the proof round trip
//! under growing substore sizes. The proof benchmarks measure both sides of
//! the protocol: opening a batch proof from the live tree and verifying the
//! resulting chain from the wire form alone.
//!
//! ## Running Benchmarks
//!
//! ```bash
//! cargo bench --bench verkle_store
//! ```

use criterion::{criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::BTreeMap;
use std::hint::black_box;
use std::sync::Arc;
use verkle_store::{
    hash::hash, verify_proof_ops, Digest, MemDb, MultiStore, QueryRequest,
};

/// Generates `n` random 20-byte keys with 32-byte values.
fn gen_kvs(n: usize, rng: &mut StdRng) -> Vec<(Vec<u8>, Vec<u8>)> {
    (0..n)
        .map(|_| {
            let key: [u8; 20] = rng.gen();
            let value: [u8; 32] = rng.gen();
            (key.to_vec(), value.to_vec())
        })
        .collect()
}

fn populated_store(kvs: &[(Vec<u8>, Vec<u8>)]) -> MultiStore<MemDb> {
    let store = MultiStore::new(Arc::new(MemDb::new()), &["store1"]).unwrap();
    for (key, value) in kvs {
        store.set("store1", key, value).unwrap();
    }
    store
}

fn bench_set_and_commit(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    for n in [64, 256] {
        let kvs = gen_kvs(n, &mut rng);
        c.bench_function(&format!("set_{n}_keys"), |b| {
            b.iter(|| black_box(populated_store(&kvs)));
        });
        let store = populated_store(&kvs);
        c.bench_function(&format!("commit_{n}_keys"), |b| {
            b.iter(|| black_box(store.commit().unwrap()));
        });
    }
}

fn bench_proof_roundtrip(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let kvs = gen_kvs(128, &mut rng);
    let store = populated_store(&kvs);
    let cid = store.commit().unwrap();

    let req = QueryRequest {
        path: "/store1/key".to_string(),
        data: kvs[0].0.clone(),
        prove: true,
    };
    c.bench_function("query_with_proof", |b| {
        b.iter(|| black_box(store.query(&req).unwrap()));
    });

    let ops = store.query(&req).unwrap().proof_ops.unwrap();
    let expected: BTreeMap<Vec<u8>, Option<Digest>> =
        [(hash(&kvs[0].0).to_vec(), Some(hash(&kvs[0].1)))].into();
    c.bench_function("verify_proof_chain", |b| {
        b.iter(|| verify_proof_ops(black_box(&ops), &cid.hash, b"store1", &expected).unwrap());
    });
}

criterion_group!(benches, bench_set_and_commit, bench_proof_roundtrip);
criterion_main!(benches);
