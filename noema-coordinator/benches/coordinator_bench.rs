//! ABOUTME: Benchmarks for lock acquire/refresh throughput and ring assignment cost

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use noema_coordinator::{assign_partitions, LockManager};
use noema_core::InstanceId;
use noema_storage::MemoryAdapter;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn bench_lock_acquire_release(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    c.bench_function("lock_acquire_then_release", |b| {
        b.iter(|| {
            rt.block_on(async {
                let storage = Arc::new(MemoryAdapter::new());
                let manager = LockManager::new(storage, "writer-bench", 30_000);
                manager.acquire(black_box(0)).await.unwrap();
                manager.release(black_box(0)).await.unwrap();
            });
        });
    });
}

fn bench_ring_assignment(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_assign_partitions");
    for writer_count in [2usize, 8, 32] {
        let writers: Vec<InstanceId> = (0..writer_count)
            .map(|i| InstanceId::from(format!("writer-{i}")))
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(writer_count), &writers, |b, writers| {
            b.iter(|| assign_partitions(black_box(writers), black_box(256)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_lock_acquire_release, bench_ring_assignment);
criterion_main!(benches);
