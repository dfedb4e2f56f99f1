//! Leaderboard over accumulated user scores.

use crate::store::{keys, FastStore, StoreError};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Leaderboard errors.
#[derive(Debug, thiserror::Error)]
pub enum LeaderboardError {
    #[error("User not found on the leaderboard: {0}")]
    UserNotFound(String),

    #[error("Score must be a finite number")]
    InvalidScore,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A leaderboard position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankEntry {
    pub user_id: String,
    pub score: f64,
    /// Zero-based, highest score first.
    pub rank: usize,
}

/// Descending ranking of accumulated scores, kept in a sorted set.
pub struct Leaderboard {
    store: Arc<dyn FastStore>,
    key: String,
}

impl Leaderboard {
    pub fn new(store: Arc<dyn FastStore>) -> Self {
        Self::with_key(store, keys::LEADERBOARD)
    }

    pub fn with_key(store: Arc<dyn FastStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Add `delta` to the user's cumulative score and return the new total.
    pub async fn record_score(&self, user_id: &str, delta: f64) -> Result<f64, LeaderboardError> {
        if !delta.is_finite() {
            return Err(LeaderboardError::InvalidScore);
        }
        let total = self.store.zincr(&self.key, user_id, delta).await?;
        debug!(user_id = user_id, delta = delta, total = total, "Score recorded");
        Ok(total)
    }

    /// The `n` highest-ranked users. Order among equal scores is
    /// implementation-defined.
    pub async fn top_n(&self, n: usize) -> Result<Vec<RankEntry>, LeaderboardError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let members = self.store.zrev_top(&self.key, n).await?;
        Ok(members
            .into_iter()
            .enumerate()
            .map(|(rank, (user_id, score))| RankEntry { user_id, score, rank })
            .collect())
    }

    /// Position and score of one user.
    pub async fn rank_of(&self, user_id: &str) -> Result<RankEntry, LeaderboardError> {
        match self.store.zrev_rank(&self.key, user_id).await? {
            Some((rank, score)) => Ok(RankEntry {
                user_id: user_id.to_string(),
                score,
                rank,
            }),
            None => Err(LeaderboardError::UserNotFound(user_id.to_string())),
        }
    }
}
