//! # Store Benchmarks
//!
//! - Reused handle: `get`/`set` on a warm store (registry hit, one txn)
//! - Batches: `set_many` and `entries` over growing sizes
//! - Open storms: many concurrent opens collapsing into one engine open

use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use futures::future::join_all;
use std::sync::Arc;
use tokio::runtime::Runtime;
use vkv_store::{Coordinator, InMemoryEngine, KeyValueApi, KvStore, OpenRequest};

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("benchmark runtime")
}

fn warm_store(rt: &Runtime) -> KvStore {
    let coordinator = Coordinator::new(Arc::new(InMemoryEngine::new()));
    let store = KvStore::new(coordinator, "bench", "kv");
    rt.block_on(store.warm_up()).expect("warm up");
    store
}

pub fn bench_single_ops(c: &mut Criterion) {
    let rt = runtime();
    let store = warm_store(&rt);
    rt.block_on(store.set(b"hot".to_vec(), vec![0u8; 128]))
        .expect("seed");

    let mut group = c.benchmark_group("vkv-store-single");

    group.bench_function("get_hit", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(store.get(b"hot").await.expect("get")) })
    });

    group.bench_function("set_128b", |b| {
        b.to_async(&rt).iter(|| async {
            store
                .set(b"hot".to_vec(), vec![1u8; 128])
                .await
                .expect("set")
        })
    });

    group.bench_function("update_counter", |b| {
        b.to_async(&rt).iter(|| async {
            store
                .update(b"counter".to_vec(), |current| {
                    let n = current.map_or(0u64, |bytes| {
                        let mut raw = [0u8; 8];
                        raw.copy_from_slice(&bytes[..8]);
                        u64::from_le_bytes(raw)
                    });
                    (n + 1).to_le_bytes().to_vec()
                })
                .await
                .expect("update")
        })
    });

    group.finish();
}

pub fn bench_batches(c: &mut Criterion) {
    let rt = runtime();
    let store = warm_store(&rt);
    let mut group = c.benchmark_group("vkv-store-batch");

    for size in [10usize, 100, 1_000] {
        let batch: Vec<_> = (0..size)
            .map(|i| ((i as u64).to_be_bytes().to_vec(), vec![0u8; 64]))
            .collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("set_many", size), &batch, |b, batch| {
            b.to_async(&rt)
                .iter(|| async { store.set_many(batch.clone()).await.expect("set_many") })
        });

        rt.block_on(store.set_many(batch.clone())).expect("seed");
        group.bench_with_input(BenchmarkId::new("entries", size), &size, |b, _| {
            b.to_async(&rt)
                .iter(|| async { black_box(store.entries().await.expect("entries").len()) })
        });
        rt.block_on(store.clear()).expect("clear");
    }

    group.finish();
}

pub fn bench_open_storm(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("vkv-store-open");

    for callers in [1usize, 16, 128] {
        group.bench_with_input(
            BenchmarkId::new("concurrent_open", callers),
            &callers,
            |b, &callers| {
                b.to_async(&rt).iter(|| async move {
                    let coordinator = Coordinator::new(Arc::new(InMemoryEngine::new()));
                    let request = OpenRequest::new("bench").with_collections(["kv"]);
                    let opened = join_all((0..callers).map(|_| coordinator.open(request.clone())))
                        .await;
                    black_box(opened.len())
                })
            },
        );
    }

    group.finish();
}
