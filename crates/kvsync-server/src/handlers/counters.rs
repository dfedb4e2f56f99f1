//! Optimistic counter handlers.

use crate::error::{ApiError, ApiResult};
use crate::request::{ConcurrentRequest, DeltaRequest, ValidatedJson};
use crate::response::ok;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    response::Response,
};
use serde_json::json;
use validator::Validate;

pub async fn current(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Response> {
    let value = state.scores.current(&user_id).await?.unwrap_or(0);
    Ok(ok(json!({ "user_id": user_id, "value": value })))
}

pub async fn apply_delta(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    ValidatedJson(req): ValidatedJson<DeltaRequest>,
) -> ApiResult<Response> {
    let value = state.scores.apply_delta(&user_id, req.delta).await?;
    Ok(ok(json!({ "user_id": user_id, "delta": req.delta, "value": value })))
}

/// Fire several deltas at one counter at once. An empty body runs the default set.
pub async fn apply_concurrently(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    body: Bytes,
) -> ApiResult<Response> {
    let req = if body.is_empty() {
        ConcurrentRequest::default()
    } else {
        serde_json::from_slice::<ConcurrentRequest>(&body)
            .map_err(|e| ApiError::BadRequest(e.to_string()))?
    };
    req.validate()?;

    let run = state.scores.apply_concurrently(&user_id, &req.deltas).await?;
    Ok(ok(run))
}
