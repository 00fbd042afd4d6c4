use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use cobs_rs::kmer::random_sequence;
use cobs_rs::{classic_construct_random, open_index, IndexSearcher};

fn query_bench(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let index_path = dir.path().join("bench.cobs_classic");
    classic_construct_random(&index_path, 1 << 20, 256, 10_000, 1, 42).unwrap();
    let file = open_index(&index_path).unwrap();
    let searcher = IndexSearcher::new(&file);
    let query = random_sequence(1000, 7);

    c.bench_function("query_1000bp_256docs", |b| {
        b.iter(|| {
            let results = searcher.search(black_box(&query), 100).unwrap();
            black_box(results);
        })
    });
}

criterion_group!(benches, query_bench);
criterion_main!(benches);
