//! User table access.

use super::health::check_health;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{debug, info};

/// Repository operation result.
pub type RepoResult<T> = Result<T, RepoError>;

/// Backing store errors.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("Backing store unavailable: {0}")]
    Unavailable(String),
    #[error("User already exists: {0}")]
    Duplicate(String),
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                RepoError::Unavailable(err.to_string())
            }
            other => RepoError::Database(other),
        }
    }
}

/// A row of the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub liked_tag: Option<String>,
}

/// Durable user storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Point lookup by id.
    async fn find_user(&self, id: &str) -> RepoResult<Option<UserRecord>>;

    /// Update the liked tag and commit. Returns the number of rows changed.
    async fn update_liked_tag(&self, id: &str, liked_tag: &str) -> RepoResult<u64>;

    /// Insert a new user.
    async fn create_user(&self, id: &str, name: &str) -> RepoResult<UserRecord>;

    /// Round-trip to the store.
    async fn ping(&self) -> RepoResult<()>;

    /// Release pooled connections.
    async fn close(&self) {}
}

/// SQLite-backed user repository.
#[derive(Clone)]
pub struct SqlUserRepository {
    pool: SqlitePool,
}

impl SqlUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_user(&self, id: &str) -> RepoResult<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(
            "SELECT id, name, liked_tag FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        debug!(user_id = id, found = user.is_some(), "User lookup");
        Ok(user)
    }

    async fn update_liked_tag(&self, id: &str, liked_tag: &str) -> RepoResult<u64> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("UPDATE users SET liked_tag = ? WHERE id = ?")
            .bind(liked_tag)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(user_id = id, rows = result.rows_affected(), "Liked tag updated");
        Ok(result.rows_affected())
    }

    async fn create_user(&self, id: &str, name: &str) -> RepoResult<UserRecord> {
        let result = sqlx::query("INSERT INTO users (id, name) VALUES (?, ?)")
            .bind(id)
            .bind(name)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => {
                info!(user_id = id, "User created");
                Ok(UserRecord {
                    id: id.to_string(),
                    name: name.to_string(),
                    liked_tag: None,
                })
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(RepoError::Duplicate(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn ping(&self) -> RepoResult<()> {
        let health = check_health(&self.pool, Duration::from_secs(2)).await;
        match health.message {
            None => Ok(()),
            Some(message) => Err(RepoError::Unavailable(message)),
        }
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}
