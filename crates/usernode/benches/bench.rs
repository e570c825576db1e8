use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use serde_json::json;
use std::{
    sync::{Arc, Barrier},
    thread::scope,
    time::Instant,
};
use tokio::runtime::Builder;
use usernode::{
    CollectionRouter, Directory, DirectoryConfig, IdGenStatus, IdNode, TimeSource,
    UserIdGenerator, UserLookup, build_update_set, merge_for_response, next_user_id, secure,
    store::MemoryStore, user_id_generator,
};

struct FixedMockTime {
    millis: u64,
}

impl TimeSource<u64> for FixedMockTime {
    fn current_millis(&self) -> u64 {
        self.millis
    }
}

// Number of IDs generated per benchmark iteration (per-thread for
// multi-threaded).
const TOTAL_IDS: usize = 1024;

fn node() -> IdNode {
    IdNode::new(1, 1).unwrap()
}

/// Hot path: a fixed clock and a sequence that never runs out.
fn benchmark_mock_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("mock/sequential");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));
    group.bench_function(format!("elems/{TOTAL_IDS}"), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                let generator =
                    UserIdGenerator::new(node().machine_id(), FixedMockTime { millis: 1 });
                for _ in 0..TOTAL_IDS {
                    match generator.next_id() {
                        IdGenStatus::Ready { id } => {
                            black_box(id);
                        }
                        IdGenStatus::Pending { .. } => unreachable!(),
                    }
                }
            }
            start.elapsed()
        });
    });
    group.finish();
}

/// One generator shared by several threads on the real clock.
fn benchmark_mono_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("mono/contended");
    for thread_count in [1, 2, 4, 8] {
        let ids_per_thread = TOTAL_IDS / thread_count;
        group.throughput(Throughput::Elements(TOTAL_IDS as u64));
        group.bench_function(format!("elems/{TOTAL_IDS}/threads/{thread_count}"), |b| {
            b.iter_custom(|iters| {
                let start = Instant::now();
                for _ in 0..iters {
                    let generator = Arc::new(user_id_generator(node()));
                    let barrier = Arc::new(Barrier::new(thread_count + 1));
                    scope(|s| {
                        for _ in 0..thread_count {
                            let generator = Arc::clone(&generator);
                            let barrier = Arc::clone(&barrier);
                            s.spawn(move || {
                                barrier.wait();
                                for _ in 0..ids_per_thread {
                                    black_box(next_user_id(&generator).unwrap());
                                }
                            });
                        }
                        barrier.wait();
                    });
                }
                start.elapsed()
            });
        });
    }
    group.finish();
}

fn benchmark_secure(c: &mut Criterion) {
    let mut group = c.benchmark_group("credential");
    group.bench_function("secure", |b| {
        b.iter(|| secure(black_box("correct horse battery staple"), black_box("pepper")))
    });
    group.finish();
}

fn benchmark_router(c: &mut Criterion) {
    let router = CollectionRouter::new("uv_");
    let mut group = c.benchmark_group("router");
    group.bench_function("info_collection", |b| {
        b.iter(|| router.info_collection(black_box("k3x9a0b1c2d3")))
    });
    group.finish();
}

fn benchmark_merge(c: &mut Criterion) {
    let info = json!({"theme": "dark", "lang": "en", "tags": ["a", "b"], "nested": {"x": 1}});
    let info = info.as_object().cloned().unwrap_or_default();
    let stored = json!({"_id": "u-k", "info": {"theme": "light", "old": true}});
    let stored = stored.as_object().cloned();

    let mut group = c.benchmark_group("merge");
    group.bench_function("build_update_set", |b| {
        b.iter(|| build_update_set(black_box(&info)))
    });
    group.bench_function("merge_for_response", |b| {
        b.iter(|| merge_for_response(black_box(stored.clone()), black_box(&info)))
    });
    group.finish();
}

/// Auto-create lookups against the in-memory store.
fn benchmark_directory_get(c: &mut Criterion) {
    let runtime = Builder::new_multi_thread().enable_all().build().unwrap();
    let directory = Directory::new(
        DirectoryConfig::new(node(), "bench", "secret"),
        Arc::new(MemoryStore::new()),
    );
    runtime.block_on(directory.init()).unwrap();

    let mut group = c.benchmark_group("directory");
    group.bench_function("get_user/auto_create", |b| {
        b.to_async(&runtime).iter(|| async {
            let lookup = UserLookup {
                name: "bench-user".to_string(),
                auto_create: true,
                ..Default::default()
            };
            black_box(directory.get_user(lookup).await.unwrap());
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_mock_sequential,
    benchmark_mono_contended,
    benchmark_secure,
    benchmark_router,
    benchmark_merge,
    benchmark_directory_get,
);
criterion_main!(benches);
