//! Shared application state.
//!
//! Connections to both stores are opened once in [`AppState::new`] and
//! released once in [`AppState::shutdown`]; handlers only borrow them.

use crate::config::{ServerConfig, StoreBackend, WriteBehindConfig};
use crate::db::{self, SqlUserRepository, UserRepository};
use crate::leaderboard::Leaderboard;
use crate::score::{RetryPolicy, ScoreUpdater};
use crate::store::{FastStore, MemoryStore, RedisStore};
use crate::sync::{CacheSynchronizer, FailureLog, WriteBehindQueue};
use anyhow::Context;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn FastStore>,
    pub users: Arc<dyn UserRepository>,
    pub sync: Arc<CacheSynchronizer>,
    pub scores: Arc<ScoreUpdater>,
    pub leaderboard: Arc<Leaderboard>,
    pub failures: Arc<FailureLog>,
    sweeper: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AppState {
    /// Connect both stores and start the background workers.
    pub async fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        let (store, sweeper) = match config.fast_store.backend {
            StoreBackend::Redis => {
                let store = RedisStore::connect(&config.fast_store.url)
                    .await
                    .context("Failed to connect to the fast store")?;
                let store: Arc<dyn FastStore> = Arc::new(store);
                (store, None)
            }
            StoreBackend::Memory => {
                let store = MemoryStore::new();
                let sweeper = store.spawn_sweeper(Duration::from_secs(
                    config.fast_store.sweep_interval_secs.max(1),
                ));
                info!("Using in-process fast store");
                let store: Arc<dyn FastStore> = Arc::new(store);
                (store, Some(sweeper))
            }
        };

        let pool = db::create_pool(&config.database).await?;
        if config.database.run_migrations {
            db::run_migrations(&pool).await?;
        }
        let users: Arc<dyn UserRepository> = Arc::new(SqlUserRepository::new(pool));

        let state = Self::from_parts(store, users, config.occ, &config.write_behind);
        *state.sweeper.lock() = sweeper;
        Ok(state)
    }

    /// Assemble state around already-connected stores.
    pub fn from_parts(
        store: Arc<dyn FastStore>,
        users: Arc<dyn UserRepository>,
        occ: RetryPolicy,
        write_behind: &WriteBehindConfig,
    ) -> Self {
        let (queue, failures) = WriteBehindQueue::spawn(users.clone(), write_behind.queue_capacity);
        let failures = FailureLog::collect(failures, write_behind.failure_log_size);

        Self {
            sync: Arc::new(CacheSynchronizer::new(
                store.clone(),
                users.clone(),
                Arc::new(queue),
            )),
            scores: Arc::new(ScoreUpdater::new(store.clone(), occ)),
            leaderboard: Arc::new(Leaderboard::new(store.clone())),
            store,
            users,
            failures,
            sweeper: Arc::new(Mutex::new(None)),
        }
    }

    /// Drain the write-behind queue and release both stores.
    pub async fn shutdown(&self) {
        info!("Draining write-behind queue");
        self.sync.queue().shutdown().await;

        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.abort();
        }

        self.users.close().await;
        info!("Stores released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryUserRepository;

    #[tokio::test]
    async fn test_new_with_memory_backends() {
        let state = AppState::new(&ServerConfig::in_memory()).await.unwrap();

        state.users.create_user("u1", "Kim").await.unwrap();
        assert_eq!(state.scores.apply_delta("u1", 3).await.unwrap(), 3);
        assert!(state.store.ping().await.is_ok());
        assert!(state.users.ping().await.is_ok());

        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_persists_queued_writes() {
        let users = MemoryUserRepository::new();
        users.create_user("u1", "Kim").await.unwrap();
        let state = AppState::from_parts(
            Arc::new(MemoryStore::new()),
            Arc::new(users.clone()),
            RetryPolicy::default(),
            &WriteBehindConfig::default(),
        );

        state
            .sync
            .update("u1", "go", crate::sync::SyncPolicy::WriteBehind)
            .await
            .unwrap();
        state.shutdown().await;

        let user = users.find_user("u1").await.unwrap().unwrap();
        assert_eq!(user.liked_tag.as_deref(), Some("go"));
    }
}
