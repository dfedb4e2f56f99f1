//! Benchmarks for the optimistic counter loop.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use kvsync_server::score::{RetryPolicy, ScoreUpdater};
use kvsync_server::store::MemoryStore;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn benchmark_uncontended_delta(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let scores = ScoreUpdater::new(Arc::new(MemoryStore::new()), RetryPolicy::default());

    c.bench_function("apply_delta_uncontended", |b| {
        b.iter(|| {
            rt.block_on(async {
                scores.apply_delta("bench", 1).await.unwrap();
            })
        })
    });
}

fn benchmark_contended_delta(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("apply_delta_contended");

    for tasks in [2usize, 8, 32] {
        let scores = Arc::new(ScoreUpdater::new(
            Arc::new(MemoryStore::new()),
            RetryPolicy::immediate(u32::MAX),
        ));

        group.bench_with_input(BenchmarkId::from_parameter(tasks), &tasks, |b, &tasks| {
            b.iter(|| {
                rt.block_on(async {
                    let handles: Vec<_> = (0..tasks)
                        .map(|_| {
                            let scores = scores.clone();
                            tokio::spawn(async move { scores.apply_delta("bench", 1).await })
                        })
                        .collect();
                    for handle in handles {
                        handle.await.unwrap().unwrap();
                    }
                })
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_uncontended_delta, benchmark_contended_delta);
criterion_main!(benches);
