//! Database pool management.

use super::config::DbConfig;
use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use tracing::info;

/// Create a database connection pool.
pub async fn create_pool(config: &DbConfig) -> Result<SqlitePool> {
    info!(url = %config.url, "Creating database connection pool...");

    let connect_options = SqliteConnectOptions::from_str(&config.url)
        .context("Invalid database URL")?
        .create_if_missing(config.create_if_missing)
        .statement_cache_capacity(config.statement_cache_size);

    let mut options = SqlitePoolOptions::new().acquire_timeout(config.acquire_timeout());

    options = if config.is_in_memory() {
        options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        options
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .idle_timeout(Some(config.idle_timeout()))
            .max_lifetime(Some(config.max_lifetime()))
    };

    let pool = options
        .connect_with(connect_options)
        .await
        .context("Failed to create database pool")?;

    // Verify connection
    verify_connection(&pool).await?;

    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database pool created"
    );

    Ok(pool)
}

/// Verify database connection.
pub async fn verify_connection(pool: &SqlitePool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Database connection verification failed")?;

    info!("Database connection verified");
    Ok(())
}

/// Get pool statistics.
pub fn pool_stats(pool: &SqlitePool) -> PoolStats {
    let idle = pool.num_idle();
    PoolStats {
        size: pool.size(),
        idle,
        active: pool.size().saturating_sub(idle as u32),
    }
}

/// Pool statistics.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    pub size: u32,
    pub idle: usize,
    pub active: u32,
}
