//! In-memory user repository.

use super::users::{RepoError, RepoResult, UserRecord, UserRepository};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// In-memory user repository, for tests and running without a database file.
#[derive(Clone, Default)]
pub struct MemoryUserRepository {
    users: Arc<DashMap<String, UserRecord>>,
    lookups: Arc<AtomicU64>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of point lookups served so far.
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_user(&self, id: &str) -> RepoResult<Option<UserRecord>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.users.get(id).map(|u| u.value().clone()))
    }

    async fn update_liked_tag(&self, id: &str, liked_tag: &str) -> RepoResult<u64> {
        match self.users.get_mut(id) {
            Some(mut user) => {
                user.liked_tag = Some(liked_tag.to_string());
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn create_user(&self, id: &str, name: &str) -> RepoResult<UserRecord> {
        let record = UserRecord {
            id: id.to_string(),
            name: name.to_string(),
            liked_tag: None,
        };
        match self.users.entry(id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(RepoError::Duplicate(id.to_string())),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn ping(&self) -> RepoResult<()> {
        Ok(())
    }
}
