//! Benchmarks for the mutation+query lifecycle of each vector index kind.
//!
//! Run with: `cargo bench`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use vecdb::vector::{
    BruteForceIndex, IvfFlatIndex, KdTreeIndex, LshIndex, RecordFilter, RecordLookup, VectorIndex,
};
use vecdb::{DistanceMetric, IvfFlatParams, KdTreeParams, LshParams, RecordId};

const DIM: usize = 32;

fn lcg_next(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    *state
}

fn random_vector(state: &mut u64) -> Vec<f32> {
    (0..DIM)
        .map(|_| ((lcg_next(state) % 2000) as f32 - 1000.0) / 1000.0)
        .collect()
}

fn bench_insert<I: VectorIndex>(c: &mut Criterion, name: &str, mut make: impl FnMut() -> I) {
    let mut state = 1u64;
    let vectors: Vec<Vec<f32>> = (0..2000).map(|_| random_vector(&mut state)).collect();

    c.bench_function(&format!("{name}_insert_2000"), |b| {
        b.iter(|| {
            let mut index = make();
            for (i, v) in vectors.iter().enumerate() {
                index.insert(RecordId::new(i as u64), v);
            }
            index
        });
    });
}

fn bench_search<I: VectorIndex>(c: &mut Criterion, name: &str, mut make: impl FnMut() -> I) {
    let mut state = 2u64;
    let vectors: Vec<Vec<f32>> = (0..2000).map(|_| random_vector(&mut state)).collect();
    let mut index = make();
    for (i, v) in vectors.iter().enumerate() {
        index.insert(RecordId::new(i as u64), v);
    }
    let lookup: &RecordLookup<'_> = &|id| vectors.get(id.get() as usize).cloned();
    let filter: Option<&RecordFilter<'_>> = None;
    let mut query_state = 3u64;
    let q = random_vector(&mut query_state);

    c.bench_with_input(BenchmarkId::new(name, "search_k10"), &index, |b, index| {
        b.iter(|| index.search(&q, 10, filter, lookup));
    });
}

fn bench_brute_force(c: &mut Criterion) {
    bench_insert(c, "brute_force", || BruteForceIndex::new(DistanceMetric::Euclidean));
    bench_search(c, "brute_force", || BruteForceIndex::new(DistanceMetric::Euclidean));
}

fn bench_kdtree(c: &mut Criterion) {
    bench_insert(c, "kdtree", || KdTreeIndex::new(DIM, KdTreeParams::default()));
    bench_search(c, "kdtree", || KdTreeIndex::new(DIM, KdTreeParams::default()));
}

fn bench_ivf_flat(c: &mut Criterion) {
    bench_insert(c, "ivf_flat", || {
        IvfFlatIndex::new(DIM, DistanceMetric::Euclidean, IvfFlatParams::default())
    });
    bench_search(c, "ivf_flat", || {
        let mut state = 2u64;
        let vectors: Vec<Vec<f32>> = (0..2000).map(|_| random_vector(&mut state)).collect();
        let mut index = IvfFlatIndex::new(DIM, DistanceMetric::Euclidean, IvfFlatParams::default());
        index.rebuild(
            &vectors
                .iter()
                .enumerate()
                .map(|(i, v)| (RecordId::new(i as u64), v.clone()))
                .collect::<Vec<_>>(),
        );
        index
    });
}

fn bench_lsh(c: &mut Criterion) {
    bench_insert(c, "lsh", || LshIndex::new(DIM, LshParams::default()));
    bench_search(c, "lsh", || LshIndex::new(DIM, LshParams::default()));
}

criterion_group!(benches, bench_brute_force, bench_kdtree, bench_ivf_flat, bench_lsh);
criterion_main!(benches);
