// Web server: Axum JSON API over the resolver.
//
// Routes (no auth; the service sits behind the site's own backend):
//   GET    /health
//   GET    /api/skins              whole roster in one call
//   GET    /api/skin/{username}
//   GET    /api/uuid/{username}    same as /api/skin, kept for old clients
//   POST   /api/batch-uuids        {"usernames": [...]}, at most 50
//   DELETE /api/cache
//   GET    /api/cache-stats

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::resolver::Resolver;

pub mod handlers;

/// Shared application state threaded through all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
    pub roster_path: Option<PathBuf>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(resolver: Arc<Resolver>, roster_path: Option<PathBuf>) -> Self {
        Self {
            resolver,
            roster_path,
            started_at: Instant::now(),
        }
    }
}

/// Start the Axum web server and block until it exits.
pub async fn run_server(state: AppState, port: u16, bind: &str) -> Result<()> {
    let app = build_router(state);

    let addr = format!("{bind}:{port}");
    info!("Skin API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/skins", get(handlers::skins::all_skins))
        .route("/api/skin/{username}", get(handlers::skins::get_skin))
        .route("/api/uuid/{username}", get(handlers::skins::get_skin))
        .route("/api/batch-uuids", post(handlers::skins::batch_uuids))
        .route("/api/cache", delete(handlers::cache::clear_cache))
        .route("/api/cache-stats", get(handlers::cache::cache_stats))
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check, always returns 200 OK with cache size and counters.
async fn health(axum::extract::State(state): axum::extract::State<AppState>) -> impl IntoResponse {
    let cache = state.resolver.cache_stats();
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "cache": { "size": cache.size },
            "uptimeSeconds": state.started_at.elapsed().as_secs(),
            "stats": state.resolver.stats(),
        })),
    )
}

/// Typed JSON error response helper.
pub fn api_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
