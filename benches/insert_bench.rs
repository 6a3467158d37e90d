//! Insertion throughput benchmarks.

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

fn benchmark_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("hnsw_insert");
    group.sample_size(10);

    for &size in &[1_000, 10_000] {
        let hashes = random_tlsh_hashes(size);

        group.bench_with_input(BenchmarkId::new("insert", size), &size, |b, _| {
            b.iter(|| {
                let config = GraphConfig::new(16, 200, 16, 32, DistanceMetric::Tlsh);
                let mut g = GraphCore::with_seed(config, 7);
                for (i, hash) in hashes.iter().enumerate() {
                    g.insert(black_box(HashRecord::new(hash.clone(), DistanceMetric::Tlsh, i as u32)))
                        .unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_insert);
criterion_main!(benches);
