//! Internal routes for health checks and queue statistics.

use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

/// Create the internal routes router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health checks
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .route("/stats", get(stats))
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn liveness() -> impl IntoResponse {
    Json(json!({
        "status": "alive",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Ready only when both stores answer.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let cache = match state.store.ping().await {
        Ok(()) => "ok".to_string(),
        Err(e) => e.to_string(),
    };
    let database = match state.users.ping().await {
        Ok(()) => "ok".to_string(),
        Err(e) => e.to_string(),
    };

    let ready = cache == "ok" && database == "ok";
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if ready { "ready" } else { "not_ready" },
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "checks": {
                "cache": cache,
                "database": database
            }
        })),
    )
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    let queue = state.sync.queue();
    Json(json!({
        "write_behind": {
            "capacity": queue.capacity(),
            "stats": queue.stats(),
            "recent_failures": state.failures.recent()
        },
        "occ": state.scores.policy()
    }))
}
