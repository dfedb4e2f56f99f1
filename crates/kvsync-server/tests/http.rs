//! HTTP surface tests driven through the router.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use kvsync_server::config::{ServerBindConfig, WriteBehindConfig};
use kvsync_server::db::{MemoryUserRepository, UserRepository};
use kvsync_server::routes::create_router;
use kvsync_server::score::RetryPolicy;
use kvsync_server::store::MemoryStore;
use kvsync_server::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn app() -> (Router, AppState) {
    let users = MemoryUserRepository::new();
    users.create_user("u1", "Kim").await.unwrap();

    let state = AppState::from_parts(
        Arc::new(MemoryStore::new()),
        Arc::new(users),
        RetryPolicy::default(),
        &WriteBehindConfig::default(),
    );
    (create_router(state.clone(), &ServerBindConfig::default()), state)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_kv_round_trip_uses_envelope() {
    let (app, _) = app().await;

    let (status, body) = call(&app, "POST", "/api/v1/kv", Some(json!({"key": "k", "value": "v"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["meta"]["timestamp"].is_string());

    let (_, body) = call(&app, "GET", "/api/v1/kv/k", None).await;
    assert_eq!(body["data"]["value"], "v");

    let (_, body) = call(&app, "GET", "/api/v1/kv/k/exists", None).await;
    assert_eq!(body["data"]["exists"], true);

    let (status, _) = call(&app, "DELETE", "/api/v1/kv/k", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, "DELETE", "/api/v1/kv/k", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (_, body) = call(&app, "GET", "/api/v1/kv/k", None).await;
    assert!(body["data"]["value"].is_null());
}

#[tokio::test]
async fn test_ttl_sentinels() {
    let (app, _) = app().await;

    let (_, body) = call(&app, "GET", "/api/v1/kv/nothing/ttl", None).await;
    assert_eq!(body["data"]["ttl"], -2);

    call(&app, "POST", "/api/v1/kv", Some(json!({"key": "plain", "value": "v"}))).await;
    let (_, body) = call(&app, "GET", "/api/v1/kv/plain/ttl", None).await;
    assert_eq!(body["data"]["ttl"], -1);

    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/kv/expire",
        Some(json!({"key": "temp", "value": "v", "ttl": 60})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = call(&app, "GET", "/api/v1/kv/temp/ttl", None).await;
    let ttl = body["data"]["ttl"].as_i64().unwrap();
    assert!((59..=60).contains(&ttl));

    let (status, body) = call(
        &app,
        "POST",
        "/api/v1/kv/expire",
        Some(json!({"key": "temp", "value": "v", "ttl": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn test_visits_count_up() {
    let (app, _) = app().await;

    let (_, body) = call(&app, "GET", "/api/v1/visits", None).await;
    assert_eq!(body["data"]["visits"], 0);

    call(&app, "POST", "/api/v1/visits", None).await;
    let (_, body) = call(&app, "POST", "/api/v1/visits", None).await;
    assert_eq!(body["data"]["visits"], 2);
}

#[tokio::test]
async fn test_leaderboard_routes() {
    let (app, _) = app().await;

    for (user, score) in [("A", 10.0), ("B", 30.0), ("C", 20.0)] {
        let (status, _) = call(
            &app,
            "POST",
            "/api/v1/leaderboard",
            Some(json!({"user_id": user, "score": score})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = call(&app, "GET", "/api/v1/leaderboard/top/2", None).await;
    let top = body["data"].as_array().unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0]["user_id"], "B");
    assert_eq!(top[1]["user_id"], "C");

    let (_, body) = call(&app, "GET", "/api/v1/leaderboard/users/B", None).await;
    assert_eq!(body["data"]["rank"], 0);
    assert_eq!(body["data"]["position"], 1);
    assert_eq!(body["data"]["score"], 30.0);

    let (status, body) = call(&app, "GET", "/api/v1/leaderboard/users/Z", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "resource_not_found");
}

#[tokio::test]
async fn test_liked_tag_policies() {
    let (app, state) = app().await;

    let (status, body) = call(
        &app,
        "PUT",
        "/api/v1/users/u1/liked-tag/write-through",
        Some(json!({"liked_tag": "rust"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["durable"], true);

    let (status, body) = call(
        &app,
        "PUT",
        "/api/v1/users/u1/liked-tag/write-behind",
        Some(json!({"liked_tag": "go"})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["durable"], false);
    assert!(body["data"]["job_id"].is_string());

    state.sync.queue().flush().await.unwrap();
    let user = state.users.find_user("u1").await.unwrap().unwrap();
    assert_eq!(user.liked_tag.as_deref(), Some("go"));

    let (_, body) = call(&app, "GET", "/api/v1/users/u1/liked-tag", None).await;
    assert_eq!(body["data"]["liked_tag"], "go");

    let (status, _) = call(
        &app,
        "PUT",
        "/api/v1/users/u1/liked-tag/write-around",
        Some(json!({"liked_tag": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_user_is_404() {
    let (app, _) = app().await;

    let (status, _) = call(&app, "GET", "/api/v1/users/ghost/liked-tag", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(
        &app,
        "PUT",
        "/api/v1/users/ghost/liked-tag/cache-aside",
        Some(json!({"liked_tag": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["details"]["id"], "ghost");
}

#[tokio::test]
async fn test_create_user_conflict() {
    let (app, _) = app().await;

    let (status, body) = call(&app, "POST", "/api/v1/users", Some(json!({"id": "u2", "name": "Lee"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["id"], "u2");

    let (status, body) = call(&app, "POST", "/api/v1/users", Some(json!({"id": "u2", "name": "Lee"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "duplicate_entry");
}

#[tokio::test]
async fn test_counter_routes() {
    let (app, _) = app().await;

    let (_, body) = call(&app, "GET", "/api/v1/counters/u1", None).await;
    assert_eq!(body["data"]["value"], 0);

    let (_, body) = call(&app, "POST", "/api/v1/counters/u1", Some(json!({"delta": 7}))).await;
    assert_eq!(body["data"]["value"], 7);

    let (status, body) = call(&app, "POST", "/api/v1/counters/u1/concurrent", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["before"], 7);
    assert_eq!(body["data"]["after"], 22);

    let (_, body) = call(
        &app,
        "POST",
        "/api/v1/counters/u1/concurrent",
        Some(json!({"deltas": [10, -2]})),
    )
    .await;
    assert_eq!(body["data"]["after"], 30);

    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/counters/u1/concurrent",
        Some(json!({"deltas": vec![1; 65]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_internal_routes() {
    let (app, _) = app().await;

    let (status, body) = call(&app, "GET", "/internal/health/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["cache"], "ok");
    assert_eq!(body["checks"]["database"], "ok");

    let (status, body) = call(&app, "GET", "/internal/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["write_behind"]["stats"]["pending"], 0);
    assert_eq!(body["occ"]["max_attempts"], 32);

    let (status, body) = call(&app, "GET", "/nowhere", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_oversized_body_is_rejected_by_middleware() {
    let (_, state) = app().await;
    let server = ServerBindConfig {
        body_limit_bytes: 64,
        ..ServerBindConfig::default()
    };
    let app = create_router(state, &server);

    let body = json!({"key": "k", "value": "x".repeat(256)}).to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/kv")
        .header("content-type", "application/json")
        .header("content-length", body.len())
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(response.headers().contains_key("x-request-id"));
}
