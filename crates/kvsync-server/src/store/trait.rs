//! Fast store trait definition.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Fast store operation result.
pub type StoreResult<T> = Result<T, StoreError>;

/// Fast store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Fast store unavailable: {0}")]
    Unavailable(String),
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Wrong type: {0}")]
    WrongType(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl StoreError {
    /// Whether the store could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The key does not exist.
    Missing,
    /// The key exists without an expiry.
    Persistent,
    /// The key expires in this many seconds.
    ExpiresIn(u64),
}

impl Ttl {
    /// Decode the Redis `TTL` reply (-2 missing, -1 no expiry).
    pub fn from_redis(raw: i64) -> Self {
        match raw {
            -2 => Self::Missing,
            r if r < 0 => Self::Persistent,
            r => Self::ExpiresIn(r as u64),
        }
    }

    /// Encode back into the Redis sentinel convention.
    pub fn as_redis(&self) -> i64 {
        match self {
            Self::Missing => -2,
            Self::Persistent => -1,
            Self::ExpiresIn(secs) => *secs as i64,
        }
    }
}

/// Result of submitting a conditional transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The staged writes were applied.
    Committed,
    /// The watched key changed since the watch; nothing was applied.
    Conflict,
}

/// In-memory key-value store with hashes, sorted sets and an optimistic
/// transaction primitive.
#[async_trait]
pub trait FastStore: Send + Sync {
    /// Get a string value.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Set a string value, clearing any expiry.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Set a string value that expires after `ttl` (whole seconds, at least one).
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Delete a key. Returns whether it existed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Check if a key exists.
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Get the remaining lifetime of a key.
    async fn ttl(&self, key: &str) -> StoreResult<Ttl>;

    /// Atomically add `delta` to an integer string value.
    async fn incr(&self, key: &str, delta: i64) -> StoreResult<i64>;

    /// Set one or more hash fields.
    async fn hset_fields(&self, key: &str, fields: &[(&str, &str)]) -> StoreResult<()>;

    /// Get every field of a hash. Missing keys yield an empty map.
    async fn hget_all(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    /// Increment a sorted-set member's score, creating it when absent.
    async fn zincr(&self, key: &str, member: &str, delta: f64) -> StoreResult<f64>;

    /// The `limit` highest-scored members, highest first.
    async fn zrev_top(&self, key: &str, limit: usize) -> StoreResult<Vec<(String, f64)>>;

    /// Zero-based descending rank and score of a member.
    async fn zrev_rank(&self, key: &str, member: &str) -> StoreResult<Option<(usize, f64)>>;

    /// Start watching a key for an optimistic transaction.
    async fn watch(&self, key: &str) -> StoreResult<Box<dyn WatchedKey>>;

    /// Round-trip to the store.
    async fn ping(&self) -> StoreResult<()>;
}

/// A key under watch. Dropping it without committing abandons the transaction.
#[async_trait]
pub trait WatchedKey: Send {
    /// The watched key.
    fn key(&self) -> &str;

    /// Read the watched key's current string value.
    async fn read(&mut self) -> StoreResult<Option<String>>;

    /// Submit `SET key value` conditionally on the key being unchanged since the watch.
    async fn commit_set(self: Box<Self>, value: String) -> StoreResult<CommitOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_sentinels() {
        assert_eq!(Ttl::from_redis(-2), Ttl::Missing);
        assert_eq!(Ttl::from_redis(-1), Ttl::Persistent);
        assert_eq!(Ttl::from_redis(5), Ttl::ExpiresIn(5));

        assert_eq!(Ttl::Missing.as_redis(), -2);
        assert_eq!(Ttl::Persistent.as_redis(), -1);
        assert_eq!(Ttl::ExpiresIn(0).as_redis(), 0);
    }

    #[test]
    fn test_unavailable_classification() {
        assert!(StoreError::Unavailable("refused".into()).is_unavailable());
        assert!(!StoreError::WrongType("user:1".into()).is_unavailable());
    }
}
