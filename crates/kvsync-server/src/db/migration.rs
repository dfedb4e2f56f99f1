//! Database migration utilities.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::info;

/// Run database migrations.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run migrations")?;

    info!("Migrations completed");
    Ok(())
}
