//! RCAE Core Search Benchmarks
//!
//! Benchmarks for the vector index and fusion hot paths using Criterion.
//! Run with: cargo bench -p rcae-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rcae_core::embeddings::cosine_similarity;
use rcae_core::model::VectorPayload;
use rcae_core::search::{linear_combination, reciprocal_rank_fusion, VectorIndex, VectorIndexConfig};

fn memory_payload(i: usize) -> VectorPayload {
    VectorPayload::Memory {
        memory_id: format!("mem-{i}"),
        title: format!("memory {i}"),
        tags: Vec::new(),
        related_files: Vec::new(),
        importance: 0.5,
    }
}

fn seeded_index(count: usize, dimensions: usize) -> VectorIndex {
    let mut index = VectorIndex::with_config(VectorIndexConfig {
        dimensions,
        ..VectorIndexConfig::default()
    })
    .expect("index should build with a valid config");
    for i in 0..count {
        let vector: Vec<f32> = (0..dimensions).map(|j| ((i * dimensions + j) as f32).sin()).collect();
        index
            .upsert(&format!("mem-{i}"), &vector, memory_payload(i))
            .expect("upsert should not fail for well-formed vectors");
    }
    index
}

fn bench_vector_upsert(c: &mut Criterion) {
    let dimensions = 256;
    c.bench_function("vector_upsert_1000x256d", |b| {
        b.iter(|| {
            let mut index = VectorIndex::with_config(VectorIndexConfig {
                dimensions,
                ..VectorIndexConfig::default()
            })
            .unwrap();
            for i in 0..1000 {
                let vector: Vec<f32> = (0..dimensions).map(|j| ((i * dimensions + j) as f32).sin()).collect();
                index.upsert(&format!("mem-{i}"), &vector, memory_payload(i)).unwrap();
            }
            black_box(index.len());
        })
    });
}

fn bench_vector_search(c: &mut Criterion) {
    let dimensions = 256;
    let index = seeded_index(1000, dimensions);
    let query: Vec<f32> = (0..dimensions).map(|j| (j as f32).cos()).collect();

    c.bench_function("vector_search_1000x256d_top10", |b| {
        b.iter(|| {
            black_box(index.search(&query, 10).unwrap());
        })
    });
}

fn bench_rrf_fusion(c: &mut Criterion) {
    let keyword_results: Vec<(String, f32)> = (0..50).map(|i| (format!("doc-{i}"), 1.0 - i as f32 / 50.0)).collect();
    let semantic_results: Vec<(String, f32)> =
        (0..50).map(|i| (format!("doc-{}", 25 + i), 1.0 - i as f32 / 50.0)).collect();

    c.bench_function("rrf_50x50", |b| {
        b.iter(|| {
            black_box(reciprocal_rank_fusion(&keyword_results, &semantic_results, 60.0));
        })
    });
}

fn bench_linear_combination(c: &mut Criterion) {
    let keyword_results: Vec<(String, f32)> = (0..50).map(|i| (format!("doc-{i}"), 1.0 - i as f32 / 50.0)).collect();
    let semantic_results: Vec<(String, f32)> =
        (0..50).map(|i| (format!("doc-{}", 25 + i), 1.0 - i as f32 / 50.0)).collect();

    c.bench_function("linear_combo_50x50", |b| {
        b.iter(|| {
            black_box(linear_combination(&keyword_results, &semantic_results, 0.3, 0.7));
        })
    });
}

fn bench_cosine_similarity(c: &mut Criterion) {
    let a: Vec<f32> = (0..256).map(|i| (i as f32).sin()).collect();
    let b: Vec<f32> = (0..256).map(|i| (i as f32).cos()).collect();

    c.bench_function("cosine_similarity_256d", |b_bench| {
        b_bench.iter(|| {
            black_box(cosine_similarity(&a, &b));
        })
    });
}

criterion_group!(
    benches,
    bench_vector_upsert,
    bench_vector_search,
    bench_rrf_fusion,
    bench_linear_combination,
    bench_cosine_similarity,
);
criterion_main!(benches);
