//! Optimistic counter updates under real parallelism.

use kvsync_server::score::{RetryPolicy, ScoreUpdater};
use kvsync_server::store::{FastStore, MemoryStore};
use proptest::prelude::*;
use std::sync::Arc;

fn updater(store: Arc<dyn FastStore>) -> Arc<ScoreUpdater> {
    // Generous bound: parallel tasks hammer a single key.
    let policy = RetryPolicy {
        max_attempts: 10_000,
        base_backoff_ms: 0,
        max_backoff_ms: 0,
    };
    Arc::new(ScoreUpdater::new(store, policy))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_tasks_lose_no_updates() {
    let scores = updater(Arc::new(MemoryStore::new()));

    let mut handles = Vec::new();
    for task in 0..16i64 {
        let scores = scores.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..50 {
                scores.apply_delta("hot", task + 1).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // 50 * (1 + 2 + ... + 16)
    assert_eq!(scores.current("hot").await.unwrap(), Some(6800));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_counters_are_independent() {
    let scores = updater(Arc::new(MemoryStore::new()));

    let a = tokio::spawn({
        let scores = scores.clone();
        async move {
            for _ in 0..100 {
                scores.apply_delta("a", 1).await.unwrap();
            }
        }
    });
    let b = tokio::spawn({
        let scores = scores.clone();
        async move {
            for _ in 0..100 {
                scores.apply_delta("b", -2).await.unwrap();
            }
        }
    });
    a.await.unwrap();
    b.await.unwrap();

    assert_eq!(scores.current("a").await.unwrap(), Some(100));
    assert_eq!(scores.current("b").await.unwrap(), Some(-200));
}

#[tokio::test]
async fn test_demo_run_reports_before_and_after() {
    let scores = updater(Arc::new(MemoryStore::new()));
    scores.apply_delta("u1", 100).await.unwrap();

    let run = scores.apply_concurrently("u1", &[1, 2, 3, 4, 5]).await.unwrap();
    assert_eq!(run.before, 100);
    assert_eq!(run.after, 115);
    assert_eq!(run.deltas, vec![1, 2, 3, 4, 5]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: concurrent deltas all land, whatever their values
    #[test]
    fn test_concurrent_deltas_sum(
        start in -1_000i64..1_000,
        deltas in prop::collection::vec(-1_000i64..1_000, 1..24)
    ) {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();

        let (after, committed, last) = rt.block_on(async {
            let scores = updater(Arc::new(MemoryStore::new()));
            scores.apply_delta("p", start).await.unwrap();

            let handles: Vec<_> = deltas
                .iter()
                .map(|&delta| {
                    let scores = scores.clone();
                    tokio::spawn(async move { scores.apply_delta("p", delta).await.unwrap() })
                })
                .collect();

            let mut committed = Vec::new();
            for handle in handles {
                committed.push(handle.await.unwrap());
            }
            let last = scores.current("p").await.unwrap();
            (last.unwrap_or(0), committed, last)
        });

        prop_assert_eq!(after, start + deltas.iter().sum::<i64>());
        prop_assert!(last.is_some());
        prop_assert!(committed.contains(&after));
    }
}
