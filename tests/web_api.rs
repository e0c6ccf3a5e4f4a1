// HTTP API tests: drive the Axum router with tower's oneshot.

#![cfg(feature = "web")]

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use cristalix_skins::web::{build_router, AppState};

use common::{resolver_for, skin_url, StubUpstream};

fn state_with(stub: &Arc<StubUpstream>, roster: Option<std::path::PathBuf>) -> AppState {
    AppState::new(Arc::new(resolver_for(stub)), roster)
}

async fn send(
    state: AppState,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = build_router(state)
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_reports_cache_size() {
    let stub = Arc::new(StubUpstream::new().player("Alice"));
    let state = state_with(&stub, None);
    state.resolver.resolve_one("Alice").await;

    let (status, body) = send(state, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["cache"]["size"], 1);
    assert_eq!(body["stats"]["upstreamCalls"], 1);
}

#[tokio::test]
async fn single_skin_found_and_missing() {
    let stub = Arc::new(StubUpstream::new().player("Notch"));
    let state = state_with(&stub, None);

    let (status, body) = send(state.clone(), Method::GET, "/api/skin/Notch", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "username": "Notch",
            "id": "id-notch",
            "textureUrl": skin_url("Notch"),
            "headUrl": skin_url("Notch"),
        })
    );

    let (status, body) = send(state, Method::GET, "/api/uuid/Ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Player Ghost not found");
}

#[tokio::test]
async fn batch_uuids_validates_and_resolves() {
    let stub = Arc::new(StubUpstream::new().player("Alice").player("bob"));
    let state = state_with(&stub, None);

    let (status, _) = send(
        state.clone(),
        Method::POST,
        "/api/batch-uuids",
        Some(json!({ "usernames": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let too_many: Vec<String> = (0..51).map(|i| format!("p{i}")).collect();
    let (status, body) = send(
        state.clone(),
        Method::POST,
        "/api/batch-uuids",
        Some(json!({ "usernames": too_many })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Maximum 50 usernames per request");
    assert_eq!(stub.call_count(), 0);

    let (status, body) = send(
        state,
        Method::POST,
        "/api/batch-uuids",
        Some(json!({ "usernames": ["Alice", "bob", "Ghost"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["players"]["Alice"]["id"], "id-alice");
    assert_eq!(body["players"]["bob"]["textureUrl"], skin_url("bob"));
}

#[tokio::test]
async fn all_skins_reads_roster_file() {
    let stub = Arc::new(StubUpstream::new().player("Alice").player("bob"));
    let path = std::env::temp_dir().join(format!("cristalix-roster-{}.txt", std::process::id()));
    std::fs::write(&path, "# staff\nAlice\n\nbob\nGhost\n").unwrap();

    let state = state_with(&stub, Some(path.clone()));
    let (status, body) = send(state, Method::GET, "/api/skins", None).await;
    std::fs::remove_file(&path).ok();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["loaded"], 2);
    assert_eq!(body["skins"]["Alice"]["id"], "id-alice");
}

#[tokio::test]
async fn all_skins_without_roster_is_empty_not_error() {
    let stub = Arc::new(StubUpstream::new());
    let (status, body) = send(state_with(&stub, None), Method::GET, "/api/skins", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["loaded"], 0);
    assert_eq!(body["skins"], json!({}));
}

#[tokio::test]
async fn cache_stats_and_clear() {
    let stub = Arc::new(StubUpstream::new().player("Alice"));
    let state = state_with(&stub, None);
    state.resolver.resolve_one("Alice").await;

    let (_, body) = send(state.clone(), Method::GET, "/api/cache-stats", None).await;
    assert_eq!(body["size"], 1);
    assert_eq!(body["entries"][0]["username"], "alice");
    assert_eq!(body["entries"][0]["playerId"], "id-alice");

    let (status, body) = send(state.clone(), Method::DELETE, "/api/cache", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, body) = send(state, Method::GET, "/api/cache-stats", None).await;
    assert_eq!(body["size"], 0);
}
