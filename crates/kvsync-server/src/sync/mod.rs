//! Cache synchronization between the fast store and the backing store.
//!
//! One [`CacheSynchronizer`] serves all three consistency policies for the
//! `liked_tag` attribute; the policy is chosen per call.

pub mod write_behind;

pub use write_behind::{FailureLog, PersistJob, WriteBehindFailure, WriteBehindQueue, WriteBehindStats};

use crate::db::{RepoError, UserRepository};
use crate::store::{keys, FastStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Consistency policy for an attribute update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncPolicy {
    /// Cache, then database; returns once both are durable.
    WriteThrough,
    /// Database first, then refresh the cache.
    CacheAside,
    /// Cache now, database later from the write-behind queue.
    WriteBehind,
}

impl fmt::Display for SyncPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::WriteThrough => "write-through",
            Self::CacheAside => "cache-aside",
            Self::WriteBehind => "write-behind",
        })
    }
}

/// Policy name that is not one of the supported policies.
#[derive(Debug, thiserror::Error)]
#[error("Unknown sync policy '{0}', expected write-through, cache-aside or write-behind")]
pub struct UnknownPolicy(pub String);

impl FromStr for SyncPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "write-through" => Ok(Self::WriteThrough),
            "cache-aside" => Ok(Self::CacheAside),
            "write-behind" => Ok(Self::WriteBehind),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

/// One side of the two-tier store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Cache,
    Database,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cache => "cache",
            Self::Database => "database",
        })
    }
}

/// Synchronization errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error(transparent)]
    Cache(#[from] StoreError),

    #[error(transparent)]
    Database(#[from] RepoError),

    /// One tier was written and the other was not. Nothing is rolled back.
    #[error("{written} was updated but the {failed} write failed")]
    PartialSync {
        written: Tier,
        failed: Tier,
        #[source]
        cause: Box<SyncError>,
    },

    #[error("Write-behind queue is full")]
    QueueFull,

    #[error("Write-behind queue is closed")]
    QueueClosed,
}

impl SyncError {
    fn partial(written: Tier, failed: Tier, cause: impl Into<SyncError>) -> Self {
        Self::PartialSync {
            written,
            failed,
            cause: Box::new(cause.into()),
        }
    }
}

/// Result of an attribute update.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub user_id: String,
    pub liked_tag: String,
    pub policy: SyncPolicy,
    /// Whether the backing store holds the value when the call returns.
    pub durable: bool,
    /// Write-behind job carrying the deferred durable write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
}

/// Where a read was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewSource {
    Cache,
    Database,
}

/// Cached view of a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserView {
    pub user_id: String,
    pub source: ViewSource,
    pub fields: BTreeMap<String, String>,
}

/// Keeps the cached `liked_tag` and its durable copy consistent.
pub struct CacheSynchronizer {
    cache: Arc<dyn FastStore>,
    users: Arc<dyn UserRepository>,
    queue: Arc<WriteBehindQueue>,
}

impl CacheSynchronizer {
    pub fn new(
        cache: Arc<dyn FastStore>,
        users: Arc<dyn UserRepository>,
        queue: Arc<WriteBehindQueue>,
    ) -> Self {
        Self { cache, users, queue }
    }

    pub fn queue(&self) -> &WriteBehindQueue {
        &self.queue
    }

    /// Update a user's liked tag under `policy`.
    pub async fn update(
        &self,
        user_id: &str,
        liked_tag: &str,
        policy: SyncPolicy,
    ) -> Result<SyncOutcome, SyncError> {
        debug!(user_id = user_id, policy = %policy, "Updating liked tag");

        let job_id = match policy {
            SyncPolicy::WriteThrough => {
                self.write_through(user_id, liked_tag).await?;
                None
            }
            SyncPolicy::CacheAside => {
                self.cache_aside(user_id, liked_tag).await?;
                None
            }
            SyncPolicy::WriteBehind => Some(self.write_behind(user_id, liked_tag).await?),
        };

        info!(user_id = user_id, policy = %policy, "Liked tag updated");
        Ok(SyncOutcome {
            user_id: user_id.to_string(),
            liked_tag: liked_tag.to_string(),
            policy,
            durable: job_id.is_none(),
            job_id,
        })
    }

    async fn cache_tag(&self, user_id: &str, liked_tag: &str) -> Result<(), StoreError> {
        self.cache
            .hset_fields(&keys::user(user_id), &[(keys::LIKED_TAG_FIELD, liked_tag)])
            .await
    }

    async fn persist_tag(&self, user_id: &str, liked_tag: &str) -> Result<(), SyncError> {
        match self.users.update_liked_tag(user_id, liked_tag).await? {
            0 => Err(SyncError::UserNotFound(user_id.to_string())),
            _ => Ok(()),
        }
    }

    async fn write_through(&self, user_id: &str, liked_tag: &str) -> Result<(), SyncError> {
        self.cache_tag(user_id, liked_tag).await?;

        match self.persist_tag(user_id, liked_tag).await {
            Ok(()) => Ok(()),
            Err(SyncError::UserNotFound(id)) => {
                // No row backs the entry just written, so drop it again.
                if let Err(e) = self.cache.delete(&keys::user(user_id)).await {
                    warn!(user_id = user_id, error = %e, "Could not evict cache entry of missing user");
                    return Err(SyncError::partial(
                        Tier::Cache,
                        Tier::Database,
                        SyncError::UserNotFound(id),
                    ));
                }
                Err(SyncError::UserNotFound(id))
            }
            Err(e) => {
                warn!(user_id = user_id, error = %e, "Write-through left the cache ahead of the database");
                Err(SyncError::partial(Tier::Cache, Tier::Database, e))
            }
        }
    }

    async fn cache_aside(&self, user_id: &str, liked_tag: &str) -> Result<(), SyncError> {
        self.persist_tag(user_id, liked_tag).await?;

        if let Err(e) = self.cache_tag(user_id, liked_tag).await {
            warn!(user_id = user_id, error = %e, "Cache-aside left the cache behind the database");
            return Err(SyncError::partial(Tier::Database, Tier::Cache, e));
        }
        Ok(())
    }

    async fn write_behind(&self, user_id: &str, liked_tag: &str) -> Result<Uuid, SyncError> {
        self.cache_tag(user_id, liked_tag).await?;

        self.queue.enqueue(user_id, liked_tag).map_err(|e| {
            warn!(user_id = user_id, error = %e, "Write-behind job could not be queued");
            SyncError::partial(Tier::Cache, Tier::Database, e)
        })
    }

    /// Read a user through the cache, populating it from the database on a miss.
    pub async fn read(&self, user_id: &str) -> Result<Option<UserView>, SyncError> {
        let key = keys::user(user_id);

        let cached = self.cache.hget_all(&key).await?;
        if !cached.is_empty() {
            debug!(user_id = user_id, "User served from cache");
            return Ok(Some(UserView {
                user_id: user_id.to_string(),
                source: ViewSource::Cache,
                fields: cached.into_iter().collect(),
            }));
        }

        let Some(user) = self.users.find_user(user_id).await? else {
            debug!(user_id = user_id, "User not found in database");
            return Ok(None);
        };

        let mut fields = vec![(keys::NAME_FIELD, user.name.as_str())];
        if let Some(tag) = user.liked_tag.as_deref() {
            fields.push((keys::LIKED_TAG_FIELD, tag));
        }
        self.cache.hset_fields(&key, &fields).await?;
        debug!(user_id = user_id, "Cache populated from database");

        Ok(Some(UserView {
            user_id: user_id.to_string(),
            source: ViewSource::Database,
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users::MockUserRepository;
    use crate::db::{MemoryUserRepository, RepoResult, UserRecord};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    /// Repository whose tag updates wait until the gate is opened.
    struct GatedRepository {
        inner: MemoryUserRepository,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl UserRepository for GatedRepository {
        async fn find_user(&self, id: &str) -> RepoResult<Option<UserRecord>> {
            self.inner.find_user(id).await
        }
        async fn update_liked_tag(&self, id: &str, liked_tag: &str) -> RepoResult<u64> {
            self.gate.notified().await;
            self.inner.update_liked_tag(id, liked_tag).await
        }
        async fn create_user(&self, id: &str, name: &str) -> RepoResult<UserRecord> {
            self.inner.create_user(id, name).await
        }
        async fn ping(&self) -> RepoResult<()> {
            Ok(())
        }
    }

    async fn setup() -> (CacheSynchronizer, MemoryStore, MemoryUserRepository) {
        let cache = MemoryStore::new();
        let users = MemoryUserRepository::new();
        users.create_user("u1", "Kim").await.unwrap();

        let (queue, _failures) = WriteBehindQueue::spawn(Arc::new(users.clone()), 16);
        let sync = CacheSynchronizer::new(
            Arc::new(cache.clone()),
            Arc::new(users.clone()),
            Arc::new(queue),
        );
        (sync, cache, users)
    }

    async fn cached_tag(cache: &MemoryStore, user_id: &str) -> Option<String> {
        cache
            .hget_all(&keys::user(user_id))
            .await
            .unwrap()
            .get(keys::LIKED_TAG_FIELD)
            .cloned()
    }

    #[test]
    fn test_policy_names() {
        let policy: SyncPolicy = serde_json::from_str("\"write-behind\"").unwrap();
        assert_eq!(policy, SyncPolicy::WriteBehind);
        assert_eq!(SyncPolicy::CacheAside.to_string(), "cache-aside");
        assert_eq!("write-through".parse::<SyncPolicy>().unwrap(), SyncPolicy::WriteThrough);
        assert!("write-around".parse::<SyncPolicy>().is_err());
    }

    #[tokio::test]
    async fn test_write_through_updates_both_tiers() {
        let (sync, cache, users) = setup().await;

        let outcome = sync.update("u1", "rust", SyncPolicy::WriteThrough).await.unwrap();
        assert!(outcome.durable);
        assert_eq!(cached_tag(&cache, "u1").await.as_deref(), Some("rust"));
        let user = users.find_user("u1").await.unwrap().unwrap();
        assert_eq!(user.liked_tag.as_deref(), Some("rust"));
    }

    #[tokio::test]
    async fn test_cache_aside_missing_user_leaves_cache_untouched() {
        let (sync, cache, _users) = setup().await;

        let err = sync.update("ghost", "rust", SyncPolicy::CacheAside).await.unwrap_err();
        assert!(matches!(err, SyncError::UserNotFound(id) if id == "ghost"));
        assert_eq!(cached_tag(&cache, "ghost").await, None);
    }

    #[tokio::test]
    async fn test_write_through_missing_user_leaves_no_cache_entry() {
        let (sync, cache, _users) = setup().await;

        let err = sync.update("ghost", "rust", SyncPolicy::WriteThrough).await.unwrap_err();
        assert!(matches!(err, SyncError::UserNotFound(id) if id == "ghost"));
        assert_eq!(cached_tag(&cache, "ghost").await, None);
        assert!(sync.read("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_behind_returns_before_durable_write() {
        let cache = MemoryStore::new();
        let inner = MemoryUserRepository::new();
        inner.create_user("u1", "Kim").await.unwrap();
        let gate = Arc::new(Notify::new());
        let users: Arc<dyn UserRepository> = Arc::new(GatedRepository {
            inner: inner.clone(),
            gate: gate.clone(),
        });

        let (queue, _failures) = WriteBehindQueue::spawn(users.clone(), 4);
        let sync = CacheSynchronizer::new(Arc::new(cache.clone()), users, Arc::new(queue));

        let outcome = sync.update("u1", "go", SyncPolicy::WriteBehind).await.unwrap();
        assert!(!outcome.durable);
        assert!(outcome.job_id.is_some());
        assert_eq!(cached_tag(&cache, "u1").await.as_deref(), Some("go"));

        // The worker is parked on the gate, so the row is still untouched.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(inner.find_user("u1").await.unwrap().unwrap().liked_tag, None);
        assert_eq!(sync.queue().stats().pending, 1);

        gate.notify_one();
        sync.queue().flush().await.unwrap();
        let user = inner.find_user("u1").await.unwrap().unwrap();
        assert_eq!(user.liked_tag.as_deref(), Some("go"));
        assert_eq!(sync.queue().stats().persisted, 1);
    }

    #[tokio::test]
    async fn test_write_through_database_failure_is_partial() {
        let cache = MemoryStore::new();
        let mut users = MockUserRepository::new();
        users
            .expect_update_liked_tag()
            .returning(|_, _| Err(RepoError::Unavailable("connection refused".to_string())));
        let users: Arc<dyn UserRepository> = Arc::new(users);

        let (queue, _failures) = WriteBehindQueue::spawn(users.clone(), 4);
        let sync = CacheSynchronizer::new(Arc::new(cache.clone()), users, Arc::new(queue));

        let err = sync.update("u1", "rust", SyncPolicy::WriteThrough).await.unwrap_err();
        match err {
            SyncError::PartialSync { written, failed, cause } => {
                assert_eq!(written, Tier::Cache);
                assert_eq!(failed, Tier::Database);
                assert!(matches!(*cause, SyncError::Database(RepoError::Unavailable(_))));
            }
            other => panic!("unexpected error {:?}", other),
        }
        // The cache write is not rolled back.
        assert_eq!(cached_tag(&cache, "u1").await.as_deref(), Some("rust"));
    }

    #[tokio::test]
    async fn test_read_populates_cache_once() {
        let (sync, cache, users) = setup().await;

        let first = sync.read("u1").await.unwrap().unwrap();
        assert_eq!(first.source, ViewSource::Database);
        assert_eq!(first.fields["name"], "Kim");
        assert_eq!(cache.hget_all(&keys::user("u1")).await.unwrap()["name"], "Kim");

        let second = sync.read("u1").await.unwrap().unwrap();
        assert_eq!(second.source, ViewSource::Cache);
        assert_eq!(users.lookups(), 1);
    }

    #[tokio::test]
    async fn test_read_missing_user() {
        let (sync, cache, _users) = setup().await;
        assert!(sync.read("ghost").await.unwrap().is_none());
        assert!(!cache.exists(&keys::user("ghost")).await.unwrap());
    }
}
