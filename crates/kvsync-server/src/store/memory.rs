//! In-memory fast store implementation.
//!
//! Every slot carries a version drawn from a store-wide clock. Writes, deletes
//! and expiries bump the version, so a watcher can detect any change to a key
//! between its watch and its commit. Deleted and expired slots are reclaimed by
//! [`MemoryStore::purge_expired`]; the highest reclaimed version is remembered
//! so that a watch on an absent key still sees a create-then-delete.

use super::r#trait::{CommitOutcome, FastStore, StoreError, StoreResult, Ttl, WatchedKey};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::debug;

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    ZSet(HashMap<String, f64>),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Hash(_) => "hash",
            Self::ZSet(_) => "zset",
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    value: Option<Value>,
    expires_at: Option<Instant>,
    version: u64,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.value.is_some() && self.expires_at.map_or(true, |at| at > now)
    }

    fn live(&self, now: Instant) -> Option<&Value> {
        if self.is_live(now) {
            self.value.as_ref()
        } else {
            None
        }
    }

    /// Drop an expired value so that writes start from an empty key.
    /// Returns whether a value was dropped.
    fn clear_expired(&mut self, now: Instant) -> bool {
        if self.value.is_some() && !self.is_live(now) {
            self.value = None;
            self.expires_at = None;
            true
        } else {
            false
        }
    }
}

fn wrong_type(key: &str, found: &Value) -> StoreError {
    StoreError::WrongType(format!("key '{}' holds a {}", key, found.type_name()))
}

/// In-memory fast store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    slots: Arc<DashMap<String, Slot>>,
    clock: Arc<AtomicU64>,
    /// Highest version among slots removed by `purge_expired`.
    reclaimed: Arc<AtomicU64>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Run `f` against the slot for `key` with the shard lock held, bumping
    /// the version when `f` reports a modification or a value expired.
    fn mutate<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut Slot, Instant) -> StoreResult<(T, bool)>,
    ) -> StoreResult<T> {
        let now = Instant::now();
        let mut slot = self.slots.entry(key.to_string()).or_default();
        let expired = slot.clear_expired(now);
        let outcome = f(&mut *slot, now);
        if expired || matches!(outcome, Ok((_, true))) {
            slot.version = self.tick();
        }
        outcome.map(|(result, _)| result)
    }

    /// Remove expired and deleted slots. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut purged = 0;
        self.slots.retain(|_, slot| {
            if slot.is_live(now) {
                return true;
            }
            self.reclaimed.fetch_max(slot.version, Ordering::SeqCst);
            purged += 1;
            false
        });
        purged
    }

    /// Number of slots held, live or not.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Start a background task that purges expired values periodically.
    pub fn spawn_sweeper(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut sweep_interval = interval(every);
            loop {
                sweep_interval.tick().await;
                let purged = store.purge_expired();
                if purged > 0 {
                    debug!(purged = purged, "Purged expired keys");
                }
            }
        })
    }
}

#[async_trait]
impl FastStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = Instant::now();
        match self.slots.get(key) {
            Some(slot) => match slot.live(now) {
                Some(Value::Str(s)) => Ok(Some(s.clone())),
                Some(other) => Err(wrong_type(key, other)),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.mutate(key, |slot, _| {
            slot.value = Some(Value::Str(value.to_string()));
            slot.expires_at = None;
            Ok(((), true))
        })
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        if ttl.as_secs() == 0 {
            return Err(StoreError::InvalidArgument(
                "expire time must be at least one second".to_string(),
            ));
        }
        self.mutate(key, |slot, now| {
            slot.value = Some(Value::Str(value.to_string()));
            slot.expires_at = Some(now + Duration::from_secs(ttl.as_secs()));
            Ok(((), true))
        })
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let Some(mut slot) = self.slots.get_mut(key) else {
            return Ok(false);
        };
        let expired = slot.clear_expired(Instant::now());
        let existed = slot.value.take().is_some();
        slot.expires_at = None;
        if expired || existed {
            slot.version = self.tick();
        }
        Ok(existed)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let now = Instant::now();
        Ok(self.slots.get(key).map_or(false, |slot| slot.is_live(now)))
    }

    async fn ttl(&self, key: &str) -> StoreResult<Ttl> {
        let now = Instant::now();
        let Some(slot) = self.slots.get(key) else {
            return Ok(Ttl::Missing);
        };
        if !slot.is_live(now) {
            return Ok(Ttl::Missing);
        }
        match slot.expires_at {
            None => Ok(Ttl::Persistent),
            Some(at) => {
                // Round to the nearest second the way Redis does.
                let millis = at.saturating_duration_since(now).as_millis() as u64;
                Ok(Ttl::ExpiresIn((millis + 500) / 1000))
            }
        }
    }

    async fn incr(&self, key: &str, delta: i64) -> StoreResult<i64> {
        self.mutate(key, |slot, _| {
            let current = match &slot.value {
                None => 0,
                Some(Value::Str(s)) => s.parse::<i64>().map_err(|_| {
                    StoreError::InvalidArgument("value is not an integer".to_string())
                })?,
                Some(other) => return Err(wrong_type(key, other)),
            };
            let next = current.checked_add(delta).ok_or_else(|| {
                StoreError::InvalidArgument("increment would overflow".to_string())
            })?;
            slot.value = Some(Value::Str(next.to_string()));
            Ok((next, true))
        })
    }

    async fn hset_fields(&self, key: &str, fields: &[(&str, &str)]) -> StoreResult<()> {
        if fields.is_empty() {
            return Err(StoreError::InvalidArgument("no hash fields given".to_string()));
        }
        self.mutate(key, |slot, _| {
            let hash = match slot.value.get_or_insert_with(|| Value::Hash(HashMap::new())) {
                Value::Hash(h) => h,
                other => return Err(wrong_type(key, other)),
            };
            for (field, value) in fields {
                hash.insert(field.to_string(), value.to_string());
            }
            Ok(((), true))
        })
    }

    async fn hget_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let now = Instant::now();
        match self.slots.get(key) {
            Some(slot) => match slot.live(now) {
                Some(Value::Hash(h)) => Ok(h.clone()),
                Some(other) => Err(wrong_type(key, other)),
                None => Ok(HashMap::new()),
            },
            None => Ok(HashMap::new()),
        }
    }

    async fn zincr(&self, key: &str, member: &str, delta: f64) -> StoreResult<f64> {
        if delta.is_nan() {
            return Err(StoreError::InvalidArgument("increment is not a number".to_string()));
        }
        self.mutate(key, |slot, _| {
            let zset = match slot.value.get_or_insert_with(|| Value::ZSet(HashMap::new())) {
                Value::ZSet(z) => z,
                other => return Err(wrong_type(key, other)),
            };
            let score = zset.entry(member.to_string()).or_insert(0.0);
            *score += delta;
            Ok((*score, true))
        })
    }

    async fn zrev_top(&self, key: &str, limit: usize) -> StoreResult<Vec<(String, f64)>> {
        let now = Instant::now();
        let mut members: Vec<(String, f64)> = match self.slots.get(key) {
            Some(slot) => match slot.live(now) {
                Some(Value::ZSet(z)) => z.iter().map(|(m, s)| (m.clone(), *s)).collect(),
                Some(other) => return Err(wrong_type(key, other)),
                None => Vec::new(),
            },
            None => Vec::new(),
        };
        members.sort_by(|a, b| descending(a, b));
        members.truncate(limit);
        Ok(members)
    }

    async fn zrev_rank(&self, key: &str, member: &str) -> StoreResult<Option<(usize, f64)>> {
        let all = self.zrev_top(key, usize::MAX).await?;
        Ok(all
            .iter()
            .position(|(m, _)| m == member)
            .map(|rank| (rank, all[rank].1)))
    }

    async fn watch(&self, key: &str) -> StoreResult<Box<dyn WatchedKey>> {
        // Read the clock first: anything created after this point has a
        // later version.
        let clock = self.clock.load(Ordering::SeqCst);
        let watched = match self.slots.get(key) {
            Some(slot) => Watched::Present(slot.version),
            None => Watched::Absent(clock),
        };
        debug!(key = key, watched = ?watched, "Watching key");
        Ok(Box::new(MemoryWatch {
            store: self.clone(),
            key: key.to_string(),
            watched,
        }))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Sorted-set order: score descending, then member descending (as `ZREVRANGE`).
fn descending(a: &(String, f64), b: &(String, f64)) -> std::cmp::Ordering {
    b.1.partial_cmp(&a.1)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| b.0.cmp(&a.0))
}

/// State of a key when it was watched.
#[derive(Debug, Clone, Copy)]
enum Watched {
    /// A slot existed with this version.
    Present(u64),
    /// No slot existed; the clock read at watch time.
    Absent(u64),
}

struct MemoryWatch {
    store: MemoryStore,
    key: String,
    watched: Watched,
}

#[async_trait]
impl WatchedKey for MemoryWatch {
    fn key(&self) -> &str {
        &self.key
    }

    async fn read(&mut self) -> StoreResult<Option<String>> {
        self.store.get(&self.key).await
    }

    async fn commit_set(self: Box<Self>, value: String) -> StoreResult<CommitOutcome> {
        let store = &self.store;
        let mut slot = match store.slots.entry(self.key.clone()) {
            Entry::Occupied(entry) => entry.into_ref(),
            Entry::Vacant(entry) => {
                // A watched slot that has since been reclaimed was deleted or
                // expired. An absent key may have been created and reclaimed.
                let untouched = match self.watched {
                    Watched::Present(_) => false,
                    Watched::Absent(clock) => store.reclaimed.load(Ordering::SeqCst) <= clock,
                };
                if !untouched {
                    return Ok(CommitOutcome::Conflict);
                }
                entry.insert(Slot::default())
            }
        };

        if slot.clear_expired(Instant::now()) {
            slot.version = store.tick();
        }
        let changed = match self.watched {
            Watched::Present(version) => slot.version != version,
            Watched::Absent(clock) => slot.version > clock,
        };
        if changed {
            return Ok(CommitOutcome::Conflict);
        }

        slot.value = Some(Value::Str(value));
        slot.expires_at = None;
        slot.version = store.tick();
        Ok(CommitOutcome::Committed)
    }
}
