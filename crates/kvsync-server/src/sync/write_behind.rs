//! Deferred durable writes.
//!
//! Write-behind updates land in the fast store synchronously and are queued
//! here; a dedicated worker applies them to the backing store in order.
//! Failed jobs are not retried. They are counted and reported on a failure
//! channel, which [`FailureLog`] can collect for inspection.

use super::SyncError;
use crate::db::UserRepository;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

/// A queued durable write.
#[derive(Debug, Clone, Serialize)]
pub struct PersistJob {
    pub id: Uuid,
    pub user_id: String,
    pub liked_tag: String,
    #[serde(skip)]
    pub queued_at: Instant,
}

/// A durable write that did not land.
#[derive(Debug, Clone, Serialize)]
pub struct WriteBehindFailure {
    pub job: PersistJob,
    pub reason: String,
}

enum Command {
    Persist(PersistJob),
    Flush(oneshot::Sender<()>),
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    persisted: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time queue counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteBehindStats {
    pub enqueued: u64,
    pub persisted: u64,
    pub failed: u64,
    pub pending: u64,
}

/// Bounded queue feeding the write-behind worker.
pub struct WriteBehindQueue {
    sender: Mutex<Option<mpsc::Sender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
    capacity: usize,
}

impl WriteBehindQueue {
    /// Start the worker. The returned receiver yields every failed job.
    pub fn spawn(
        users: Arc<dyn UserRepository>,
        capacity: usize,
    ) -> (Self, mpsc::UnboundedReceiver<WriteBehindFailure>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (failure_tx, failure_rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());

        let worker = tokio::spawn(run_worker(receiver, users, counters.clone(), failure_tx));
        info!(capacity = capacity, "Write-behind worker started");

        let queue = Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            counters,
            capacity,
        };
        (queue, failure_rx)
    }

    fn sender(&self) -> Result<mpsc::Sender<Command>, SyncError> {
        self.sender.lock().clone().ok_or(SyncError::QueueClosed)
    }

    /// Queue a durable write without waiting for it.
    pub fn enqueue(&self, user_id: &str, liked_tag: &str) -> Result<Uuid, SyncError> {
        let job = PersistJob {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            liked_tag: liked_tag.to_string(),
            queued_at: Instant::now(),
        };
        let id = job.id;

        self.sender()?.try_send(Command::Persist(job)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SyncError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SyncError::QueueClosed,
        })?;

        self.counters.enqueued.fetch_add(1, Ordering::SeqCst);
        debug!(job_id = %id, user_id = user_id, "Write-behind job queued");
        Ok(id)
    }

    /// Wait until every job queued before this call has been applied or reported.
    pub async fn flush(&self) -> Result<(), SyncError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.sender()?
            .send(Command::Flush(ack_tx))
            .await
            .map_err(|_| SyncError::QueueClosed)?;
        ack_rx.await.map_err(|_| SyncError::QueueClosed)
    }

    /// Stop accepting jobs, drain the queue and wait for the worker.
    pub async fn shutdown(&self) {
        drop(self.sender.lock().take());
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(error = %e, "Write-behind worker panicked");
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> WriteBehindStats {
        let enqueued = self.counters.enqueued.load(Ordering::SeqCst);
        let persisted = self.counters.persisted.load(Ordering::SeqCst);
        let failed = self.counters.failed.load(Ordering::SeqCst);
        WriteBehindStats {
            enqueued,
            persisted,
            failed,
            pending: enqueued.saturating_sub(persisted + failed),
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<Command>,
    users: Arc<dyn UserRepository>,
    counters: Arc<Counters>,
    failures: mpsc::UnboundedSender<WriteBehindFailure>,
) {
    while let Some(command) = receiver.recv().await {
        let job = match command {
            Command::Persist(job) => job,
            Command::Flush(ack) => {
                let _ = ack.send(());
                continue;
            }
        };

        let reason = match users.update_liked_tag(&job.user_id, &job.liked_tag).await {
            Ok(0) => Some(format!("user '{}' not found", job.user_id)),
            Ok(_) => None,
            Err(e) => Some(e.to_string()),
        };

        match reason {
            None => {
                counters.persisted.fetch_add(1, Ordering::SeqCst);
                debug!(
                    job_id = %job.id,
                    user_id = %job.user_id,
                    lag_ms = job.queued_at.elapsed().as_millis() as u64,
                    "Write-behind job persisted"
                );
            }
            Some(reason) => {
                counters.failed.fetch_add(1, Ordering::SeqCst);
                error!(
                    job_id = %job.id,
                    user_id = %job.user_id,
                    reason = %reason,
                    "Write-behind job failed"
                );
                // The receiver may be gone; failures stay counted either way.
                let _ = failures.send(WriteBehindFailure { job, reason });
            }
        }
    }

    info!("Write-behind worker stopped");
}

/// Keeps the most recent write-behind failures.
pub struct FailureLog {
    recent: Mutex<VecDeque<WriteBehindFailure>>,
    limit: usize,
}

impl FailureLog {
    /// Drain `failures` into a log keeping the last `limit` entries.
    pub fn collect(
        mut failures: mpsc::UnboundedReceiver<WriteBehindFailure>,
        limit: usize,
    ) -> Arc<Self> {
        let log = Arc::new(Self {
            recent: Mutex::new(VecDeque::with_capacity(limit)),
            limit,
        });

        let sink = log.clone();
        tokio::spawn(async move {
            while let Some(failure) = failures.recv().await {
                sink.push(failure);
            }
        });

        log
    }

    fn push(&self, failure: WriteBehindFailure) {
        let mut recent = self.recent.lock();
        if recent.len() == self.limit {
            recent.pop_front();
        }
        recent.push_back(failure);
    }

    /// Most recent failures, oldest first.
    pub fn recent(&self) -> Vec<WriteBehindFailure> {
        self.recent.lock().iter().cloned().collect()
    }
}
