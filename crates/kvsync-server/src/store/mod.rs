//! Fast store layer.
//!
//! Provides both in-memory and Redis backends behind one interface, including
//! the watch / conditional-submit primitive used by the score updater.

pub mod r#trait;
pub mod keys;
pub mod memory;
pub mod redis;

pub use r#trait::{CommitOutcome, FastStore, StoreError, StoreResult, Ttl, WatchedKey};
pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;
