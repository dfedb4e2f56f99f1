//! User row and liked-tag handlers.

use crate::error::{not_found, ApiResult};
use crate::request::{CreateUserRequest, LikedTagRequest, ValidatedJson};
use crate::response::{accepted, created, ok};
use crate::state::AppState;
use crate::store::keys;
use crate::sync::{SyncPolicy, ViewSource};
use axum::{
    extract::{Path, State},
    response::Response,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct LikedTagView {
    pub user_id: String,
    pub liked_tag: Option<String>,
    pub source: ViewSource,
}

pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> ApiResult<Response> {
    let user = state.users.create_user(&req.id, &req.name).await?;
    Ok(created(user))
}

/// Read the liked tag through the cache.
pub async fn liked_tag(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Response> {
    let view = state
        .sync
        .read(&user_id)
        .await?
        .ok_or_else(|| not_found("User", &user_id))?;

    Ok(ok(LikedTagView {
        liked_tag: view.fields.get(keys::LIKED_TAG_FIELD).cloned(),
        user_id: view.user_id,
        source: view.source,
    }))
}

/// Update the liked tag under the policy named in the path.
pub async fn update_liked_tag(
    State(state): State<AppState>,
    Path((user_id, policy)): Path<(String, String)>,
    ValidatedJson(req): ValidatedJson<LikedTagRequest>,
) -> ApiResult<Response> {
    let policy: SyncPolicy = policy.parse()?;

    let outcome = state.sync.update(&user_id, &req.liked_tag, policy).await?;

    Ok(if outcome.durable {
        ok(outcome)
    } else {
        accepted(outcome)
    })
}
