//! ABOUTME: Benchmarks for the graph layer
//! ABOUTME: Measures addVerb placeholder creation and adjacency traversal

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use noema_core::{Direction, Role};
use noema_graph::GraphLayer;
use noema_storage::cache::{CacheSizing, CacheTier};
use noema_storage::MemoryAdapter;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn make_store() -> noema_graph::GraphStore {
    let storage = Arc::new(MemoryAdapter::new());
    let cache = Arc::new(CacheTier::new(
        storage.clone(),
        CacheSizing::from_budget(64 * 1024 * 1024, Role::Hybrid, 256),
    ));
    noema_graph::GraphStore::new(storage, cache, 8)
}

fn bench_add_verb(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = make_store();

    c.bench_function("graph_add_verb_with_placeholders", |b| {
        b.iter(|| {
            rt.block_on(store.add_verb(
                black_box("src"),
                black_box("tgt"),
                black_box("knows"),
                Default::default(),
                None,
            ))
            .unwrap();
        })
    });
}

fn bench_adjacency(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = make_store();
    rt.block_on(async {
        for i in 0..256 {
            store
                .add_verb("hub", &format!("leaf{i}"), "links", Default::default(), None)
                .await
                .unwrap();
        }
    });

    c.bench_function("graph_adjacency_out_256_edges", |b| {
        b.iter(|| rt.block_on(store.adjacency(black_box("hub"), Direction::Out, None)))
    });
}

criterion_group!(benches, bench_add_verb, bench_adjacency);
criterion_main!(benches);
