use criterion::{criterion_group, criterion_main, Criterion};

use mnemon_index::{FlatIndex, QueryOpts, VectorIndex};

fn corpus(dims: usize, count: usize) -> FlatIndex {
    let mut index = FlatIndex::new(dims);
    let mut state = 0x2545f4914f6cdd1du64;
    for id in 0..count as i64 {
        let v: Vec<f32> = (0..dims)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                ((state % 2000) as f32 / 1000.0) - 1.0
            })
            .collect();
        index.add(id, &v).unwrap();
    }
    index
}

fn bench_query(c: &mut Criterion) {
    let index = corpus(384, 10_000);
    let query: Vec<f32> = (0..384).map(|i| (i as f32).sin()).collect();

    c.bench_function("flat_query_10k_384d_top10", |b| {
        b.iter(|| index.query(&query, QueryOpts::top_k(10)).unwrap())
    });
}

criterion_group!(benches, bench_query);
criterion_main!(benches);
