//! Concurrent score updater.
//!
//! Applies deltas to a per-user integer counter with optimistic concurrency:
//! watch the counter, read it, and submit the new value conditionally. A
//! submission rejected because another writer touched the counter is retried
//! from scratch with the same delta, under a bounded [`RetryPolicy`].

pub mod retry;

pub use retry::RetryPolicy;

use crate::store::{keys, CommitOutcome, FastStore, StoreError};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Score updater errors.
#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error("Counter contention not resolved after {attempts} attempts")]
    ContentionExhausted { attempts: u32 },

    #[error("Counter '{key}' holds a non-integer value: {value}")]
    InvalidCounter { key: String, value: String },

    #[error("Applying {delta} to {current} overflows the counter")]
    Overflow { current: i64, delta: i64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of firing several deltas at one counter at the same time.
#[derive(Debug, Clone, Serialize)]
pub struct ConcurrentRun {
    pub user_id: String,
    /// Counter value before the run.
    pub before: i64,
    pub deltas: Vec<i64>,
    /// Value each delta committed, in the order the deltas were given.
    pub committed: Vec<i64>,
    /// Counter value after every delta committed.
    pub after: i64,
}

/// Optimistic read-modify-write engine for per-user counters.
pub struct ScoreUpdater {
    store: Arc<dyn FastStore>,
    policy: RetryPolicy,
}

impl ScoreUpdater {
    pub fn new(store: Arc<dyn FastStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Add `delta` to the user's counter and return the value written.
    pub async fn apply_delta(&self, user_id: &str, delta: i64) -> Result<i64, ScoreError> {
        let key = keys::score(user_id);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(user_id = user_id, attempt = attempt, delta = delta, "Counter update attempt");

            match self.attempt(&key, delta).await? {
                Some(value) => {
                    info!(
                        user_id = user_id,
                        attempt = attempt,
                        value = value,
                        "Counter update committed"
                    );
                    return Ok(value);
                }
                None if attempt >= self.policy.max_attempts => {
                    warn!(user_id = user_id, attempts = attempt, "Counter contention exhausted");
                    return Err(ScoreError::ContentionExhausted { attempts: attempt });
                }
                None => {
                    debug!(user_id = user_id, attempt = attempt, "Counter changed under watch, retrying");
                    let pause = self.policy.backoff(attempt);
                    if !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                }
            }
        }
    }

    /// One watch / read / conditional-submit round. `None` means conflict.
    async fn attempt(&self, key: &str, delta: i64) -> Result<Option<i64>, ScoreError> {
        let mut watched = self.store.watch(key).await?;

        let current = match watched.read().await? {
            None => 0,
            Some(raw) => raw.parse::<i64>().map_err(|_| ScoreError::InvalidCounter {
                key: key.to_string(),
                value: raw.clone(),
            })?,
        };

        let next = current
            .checked_add(delta)
            .ok_or(ScoreError::Overflow { current, delta })?;

        match watched.commit_set(next.to_string()).await? {
            CommitOutcome::Committed => Ok(Some(next)),
            CommitOutcome::Conflict => Ok(None),
        }
    }

    /// Current counter value, `None` if the user has no counter yet.
    pub async fn current(&self, user_id: &str) -> Result<Option<i64>, ScoreError> {
        let key = keys::score(user_id);
        match self.store.get(&key).await? {
            None => Ok(None),
            Some(raw) => raw
                .parse::<i64>()
                .map(Some)
                .map_err(|_| ScoreError::InvalidCounter { key, value: raw }),
        }
    }

    /// Fire every delta at the same counter concurrently and wait for all of them.
    pub async fn apply_concurrently(
        &self,
        user_id: &str,
        deltas: &[i64],
    ) -> Result<ConcurrentRun, ScoreError> {
        let before = self.current(user_id).await?.unwrap_or(0);

        let results = join_all(deltas.iter().map(|&delta| self.apply_delta(user_id, delta))).await;
        let committed = results.into_iter().collect::<Result<Vec<_>, _>>()?;

        let after = self.current(user_id).await?.unwrap_or(0);
        info!(user_id = user_id, before = before, after = after, "Concurrent run finished");

        Ok(ConcurrentRun {
            user_id: user_id.to_string(),
            before,
            deltas: deltas.to_vec(),
            committed,
            after,
        })
    }
}
