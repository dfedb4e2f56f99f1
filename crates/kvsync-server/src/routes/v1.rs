//! API v1 routes.

use crate::handlers::{counters, kv, leaderboard, users};
use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};

/// Create the v1 API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/kv", kv_routes())
        .route("/visits", get(kv::visits).post(kv::record_visit))
        .nest("/leaderboard", leaderboard_routes())
        .nest("/users", user_routes())
        .nest("/counters", counter_routes())
}

fn kv_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(kv::set_value))
        .route("/expire", post(kv::set_with_expiry))
        .route("/:key", get(kv::get_value).delete(kv::delete_value))
        .route("/:key/exists", get(kv::exists))
        .route("/:key/ttl", get(kv::ttl))
}

fn leaderboard_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(leaderboard::record_score))
        .route("/top/:n", get(leaderboard::top))
        .route("/users/:user_id", get(leaderboard::rank))
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(users::create_user))
        .route("/:user_id/liked-tag", get(users::liked_tag))
        .route("/:user_id/liked-tag/:policy", put(users::update_liked_tag))
}

fn counter_routes() -> Router<AppState> {
    Router::new()
        .route("/:user_id", get(counters::current).post(counters::apply_delta))
        .route("/:user_id/concurrent", post(counters::apply_concurrently))
}
