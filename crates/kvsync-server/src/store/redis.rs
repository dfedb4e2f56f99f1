//! Redis fast store implementation.

use super::r#trait::{CommitOutcome, FastStore, StoreError, StoreResult, Ttl, WatchedKey};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_refusal()
            || err.is_connection_dropped()
            || err.is_timeout()
        {
            StoreError::Unavailable(err.to_string())
        } else if err.code() == Some("WRONGTYPE") {
            StoreError::WrongType(err.to_string())
        } else {
            StoreError::Backend(err.to_string())
        }
    }
}

/// Redis-backed fast store.
///
/// Plain commands share one multiplexed [`ConnectionManager`]. `WATCH` state
/// lives on a connection, so each optimistic transaction opens its own.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    manager: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis at `url`.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::InvalidArgument(e.to_string()))?;
        let manager = ConnectionManager::new(client.clone()).await?;

        info!(url = %url, "Connected to Redis");
        Ok(Self { client, manager })
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

#[async_trait]
impl FastStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let value: Option<String> = self.conn().get(key).await?;
        debug!(key = key, hit = value.is_some(), "Redis get");
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.conn().set::<_, _, ()>(key, value).await?;
        debug!(key = key, "Redis set");
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        if ttl.as_secs() == 0 {
            return Err(StoreError::InvalidArgument(
                "expire time must be at least one second".to_string(),
            ));
        }
        self.conn()
            .set_ex::<_, _, ()>(key, value, ttl.as_secs())
            .await?;
        debug!(key = key, ttl_secs = ttl.as_secs(), "Redis setex");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let deleted: i64 = self.conn().del(key).await?;
        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let exists: bool = self.conn().exists(key).await?;
        Ok(exists)
    }

    async fn ttl(&self, key: &str) -> StoreResult<Ttl> {
        let raw: i64 = self.conn().ttl(key).await?;
        Ok(Ttl::from_redis(raw))
    }

    async fn incr(&self, key: &str, delta: i64) -> StoreResult<i64> {
        let value: i64 = self.conn().incr(key, delta).await?;
        Ok(value)
    }

    async fn hset_fields(&self, key: &str, fields: &[(&str, &str)]) -> StoreResult<()> {
        if fields.is_empty() {
            return Err(StoreError::InvalidArgument("no hash fields given".to_string()));
        }
        self.conn().hset_multiple::<_, _, _, ()>(key, fields).await?;
        debug!(key = key, fields = fields.len(), "Redis hset");
        Ok(())
    }

    async fn hget_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let hash: HashMap<String, String> = self.conn().hgetall(key).await?;
        Ok(hash)
    }

    async fn zincr(&self, key: &str, member: &str, delta: f64) -> StoreResult<f64> {
        let score: f64 = self.conn().zincr(key, member, delta).await?;
        Ok(score)
    }

    async fn zrev_top(&self, key: &str, limit: usize) -> StoreResult<Vec<(String, f64)>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let stop = isize::try_from(limit - 1).unwrap_or(isize::MAX);
        let members: Vec<(String, f64)> = self.conn().zrevrange_withscores(key, 0, stop).await?;
        Ok(members)
    }

    async fn zrev_rank(&self, key: &str, member: &str) -> StoreResult<Option<(usize, f64)>> {
        let (rank, score): (Option<usize>, Option<f64>) = redis::pipe()
            .atomic()
            .zrevrank(key, member)
            .zscore(key, member)
            .query_async(&mut self.conn())
            .await?;
        Ok(rank.zip(score))
    }

    async fn watch(&self, key: &str) -> StoreResult<Box<dyn WatchedKey>> {
        let mut conn = self.client.get_async_connection().await?;
        redis::cmd("WATCH")
            .arg(key)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(Box::new(RedisWatch {
            conn,
            key: key.to_string(),
        }))
    }

    async fn ping(&self) -> StoreResult<()> {
        redis::cmd("PING")
            .query_async::<_, String>(&mut self.conn())
            .await?;
        Ok(())
    }
}

struct RedisWatch {
    conn: redis::aio::Connection,
    key: String,
}

#[async_trait]
impl WatchedKey for RedisWatch {
    fn key(&self) -> &str {
        &self.key
    }

    async fn read(&mut self) -> StoreResult<Option<String>> {
        let value: Option<String> = self.conn.get(&self.key).await?;
        Ok(value)
    }

    async fn commit_set(self: Box<Self>, value: String) -> StoreResult<CommitOutcome> {
        let RedisWatch { mut conn, key } = *self;
        // EXEC replies nil when a watched key was touched since WATCH.
        let reply: Option<redis::Value> = redis::pipe()
            .atomic()
            .set(&key, value)
            .query_async(&mut conn)
            .await?;
        Ok(match reply {
            Some(_) => CommitOutcome::Committed,
            None => CommitOutcome::Conflict,
        })
    }
}
