//! Backing store: the durable `users` table.
//!
//! This module provides:
//! - Connection pool configuration and management
//! - Health monitoring
//! - Embedded migrations
//! - The [`UserRepository`] seam with SQLite and in-memory implementations

pub mod config;
pub mod health;
pub mod memory;
pub mod migration;
pub mod pool;
pub mod users;

pub use self::config::DbConfig;
pub use health::{check_health, DbHealth};
pub use memory::MemoryUserRepository;
pub use migration::run_migrations;
pub use pool::{create_pool, pool_stats, verify_connection, PoolStats};
pub use users::{RepoError, RepoResult, SqlUserRepository, UserRecord, UserRepository};
