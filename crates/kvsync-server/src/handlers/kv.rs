//! Raw key/value operations and the page-view counter.

use crate::error::{not_found, ApiError, ApiResult};
use crate::request::{ExpireRequest, SetValueRequest, ValidatedJson};
use crate::response::ok;
use crate::state::AppState;
use crate::store::keys;
use axum::{
    extract::{Path, State},
    response::Response,
};
use serde_json::json;
use std::time::Duration;

pub async fn get_value(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Response> {
    let value = state.store.get(&key).await?;
    Ok(ok(json!({ "key": key, "value": value })))
}

pub async fn set_value(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SetValueRequest>,
) -> ApiResult<Response> {
    state.store.set(&req.key, &req.value).await?;
    Ok(ok(json!({ "key": req.key, "value": req.value })))
}

pub async fn delete_value(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Response> {
    if !state.store.delete(&key).await? {
        return Err(not_found("Key", &key));
    }
    Ok(ok(json!({ "key": key, "deleted": true })))
}

pub async fn exists(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Response> {
    let exists = state.store.exists(&key).await?;
    Ok(ok(json!({ "key": key, "exists": exists })))
}

/// Set a value that expires after `ttl` seconds.
pub async fn set_with_expiry(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ExpireRequest>,
) -> ApiResult<Response> {
    state
        .store
        .set_ex(&req.key, &req.value, Duration::from_secs(req.ttl))
        .await?;
    Ok(ok(json!({ "key": req.key, "value": req.value, "ttl": req.ttl })))
}

/// Remaining lifetime: -2 for a missing key, -1 for a key without expiry.
pub async fn ttl(State(state): State<AppState>, Path(key): Path<String>) -> ApiResult<Response> {
    let ttl = state.store.ttl(&key).await?;
    Ok(ok(json!({ "key": key, "ttl": ttl.as_redis() })))
}

pub async fn record_visit(State(state): State<AppState>) -> ApiResult<Response> {
    let visits = state.store.incr(keys::VISITS, 1).await?;
    Ok(ok(json!({ "visits": visits })))
}

pub async fn visits(State(state): State<AppState>) -> ApiResult<Response> {
    let visits = match state.store.get(keys::VISITS).await? {
        None => 0,
        Some(raw) => raw.parse::<i64>().map_err(|_| {
            ApiError::UnprocessableEntity(format!("visit counter holds '{}'", raw))
        })?,
    };
    Ok(ok(json!({ "visits": visits })))
}
