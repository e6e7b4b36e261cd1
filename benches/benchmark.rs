// Query latency of the exact and HNSW nearest-neighbor backends
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use resrank_core::{EntityId, HnswParams, IndexOptions, KeywordSets, SimilarityIndex};
use resrank_scoring::{CandidateScorer, EnrichmentContext, QueryTokens};
use std::sync::Arc;
use std::thread;

const DIM: usize = 1024;

fn generate_vectors(n: usize, dim: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    (0..n)
        .map(|_| (0..dim).map(|_| rng.random_range(-1.0f32..1.0f32)).collect())
        .collect()
}

fn build_index(n: usize, options: &IndexOptions) -> (SimilarityIndex, Vec<Vec<f32>>) {
    let mut rng = StdRng::seed_from_u64(42);
    let ids: Vec<EntityId> = (0..n as u64).map(EntityId::from).collect();
    let vectors = generate_vectors(n, DIM, &mut rng);
    let index = SimilarityIndex::build(
        ids.iter().zip(vectors.iter().map(|v| v.as_slice())),
        options,
    )
    .unwrap()
    .index;
    let queries = generate_vectors(32, DIM, &mut rng);
    (index, queries)
}

fn benchmark_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    group.sample_size(10);

    for size in [1000, 5000].iter() {
        group.bench_with_input(BenchmarkId::new("exact", size), size, |b, &size| {
            b.iter(|| build_index(size, &IndexOptions::exact()));
        });
        group.bench_with_input(BenchmarkId::new("hnsw", size), size, |b, &size| {
            b.iter(|| build_index(size, &IndexOptions::hnsw(HnswParams::default())));
        });
    }

    group.finish();
}

fn benchmark_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_top50");

    for size in [1000, 10000].iter() {
        for (name, options) in [
            ("exact", IndexOptions::exact()),
            ("hnsw", IndexOptions::hnsw(HnswParams::default())),
        ] {
            let (index, queries) = build_index(*size, &options);
            group.bench_with_input(BenchmarkId::new(name, size), size, |b, _| {
                let mut i = 0;
                b.iter(|| {
                    i = (i + 1) % queries.len();
                    black_box(index.query(&queries[i], 50).unwrap())
                });
            });
        }
    }

    group.finish();
}

fn benchmark_concurrent_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_query");
    let (index, queries) = build_index(10000, &IndexOptions::exact());
    let index = Arc::new(index);
    let queries = Arc::new(queries);

    group.bench_function("exact_10_threads", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..10)
                .map(|t| {
                    let index = index.clone();
                    let queries = queries.clone();
                    thread::spawn(move || index.query(&queries[t], 50).unwrap())
                })
                .collect();

            for handle in handles {
                black_box(handle.join().unwrap());
            }
        });
    });

    group.finish();
}

fn benchmark_scoring(c: &mut Criterion) {
    let scorer = CandidateScorer::default();
    let keywords = KeywordSets::new(
        (0..40).map(|i| format!("keyword {}", i)).collect(),
        (0..20).map(|i| format!("특허 {}", i)).collect(),
    );
    let tokens = QueryTokens::parse("keyword battery solid state electrolyte cathode");
    let id = EntityId::from("r1");

    c.bench_function("score_candidate", |b| {
        b.iter(|| {
            black_box(scorer.score(
                &id,
                "Dr. Kim",
                &keywords,
                0.82,
                &tokens,
                EnrichmentContext::empty(),
            ))
        });
    });
}

criterion_group!(
    benches,
    benchmark_build,
    benchmark_query,
    benchmark_concurrent_queries,
    benchmark_scoring
);
criterion_main!(benches);
