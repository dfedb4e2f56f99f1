//! Leaderboard handlers.

use crate::error::ApiResult;
use crate::leaderboard::RankEntry;
use crate::request::{RecordScoreRequest, ValidatedJson};
use crate::response::ok;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::Response,
};
use serde::Serialize;
use serde_json::json;

/// Rank entry as reported to clients.
#[derive(Debug, Serialize)]
pub struct RankView {
    pub user_id: String,
    pub score: f64,
    /// Zero-based rank.
    pub rank: usize,
    /// One-based position.
    pub position: usize,
}

impl From<RankEntry> for RankView {
    fn from(entry: RankEntry) -> Self {
        Self {
            position: entry.rank + 1,
            user_id: entry.user_id,
            score: entry.score,
            rank: entry.rank,
        }
    }
}

pub async fn record_score(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RecordScoreRequest>,
) -> ApiResult<Response> {
    let total = state.leaderboard.record_score(&req.user_id, req.score).await?;
    Ok(ok(json!({ "user_id": req.user_id, "score": total })))
}

pub async fn top(State(state): State<AppState>, Path(n): Path<usize>) -> ApiResult<Response> {
    let entries: Vec<RankView> = state
        .leaderboard
        .top_n(n)
        .await?
        .into_iter()
        .map(RankView::from)
        .collect();
    Ok(ok(entries))
}

pub async fn rank(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Response> {
    let entry = state.leaderboard.rank_of(&user_id).await?;
    Ok(ok(RankView::from(entry)))
}
