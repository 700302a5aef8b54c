//! Benchmarks for nearest-neighbor queries through the coordinator

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use embeddb::{
    AccessCoordinator, DistanceMetric, IndexKind, MemoryStore, NewEmbedding, Vector,
};

fn random_items(n: usize, dim: usize) -> Vec<NewEmbedding> {
    (0..n)
        .map(|i| {
            let data: Vec<f32> = (0..dim).map(|_| rand::random::<f32>()).collect();
            NewEmbedding::new(Vector::new(data), format!("uri-{}", i))
        })
        .collect()
}

fn benchmark_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");

    for size in [100, 1000, 10000].iter() {
        let coord =
            AccessCoordinator::new(MemoryStore::new(), IndexKind::Flat, DistanceMetric::L2);
        coord.add("default", random_items(*size, 128)).unwrap();

        let query = Vector::new(vec![0.5; 128]);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                coord
                    .query("default", black_box(&query), black_box(10), None)
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_query);
criterion_main!(benches);
