//! k-NN and threshold search benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fuzzy_hnsw_index::graph::{GraphConfig, GraphCore};
use fuzzy_hnsw_index::metric::DistanceMetric;
use fuzzy_hnsw_index::record::HashRecord;
use rand::Rng;

fn random_tlsh_hashes(n: usize) -> Vec<String> {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|_| {
            let body: String = (0..70).map(|_| format!("{:x}", rng.gen_range(0..16u8))).collect();
            format!("T1{body}")
        })
        .collect()
}

fn build_graph(size: usize) -> GraphCore {
    let config = GraphConfig::new(16, 200, 16, 32, DistanceMetric::Tlsh);
    let mut g = GraphCore::with_seed(config, 7);
    for (i, hash) in random_tlsh_hashes(size).into_iter().enumerate() {
        g.insert(HashRecord::new(hash, DistanceMetric::Tlsh, i as u32)).unwrap();
    }
    g
}

fn benchmark_knn(c: &mut Criterion) {
    let mut group = c.benchmark_group("knn_search");

    for &size in &[1_000, 10_000] {
        let g = build_graph(size);
        let query = HashRecord::new(random_tlsh_hashes(1).pop().unwrap(), DistanceMetric::Tlsh, u32::MAX);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| g.knn_search(black_box(&query), black_box(10), 100).unwrap());
        });
    }

    group.finish();
}

fn benchmark_threshold(c: &mut Criterion) {
    let mut group = c.benchmark_group("threshold_search");
    group.sample_size(20);

    let g = build_graph(5_000);
    let query = HashRecord::new(random_tlsh_hashes(1).pop().unwrap(), DistanceMetric::Tlsh, u32::MAX);

    group.bench_function("hops_2", |b| {
        b.iter(|| g.threshold_search(black_box(&query), black_box(30.0), 2).unwrap());
    });

    group.finish();
}

criterion_group!(benches, benchmark_knn, benchmark_threshold);
criterion_main!(benches);
