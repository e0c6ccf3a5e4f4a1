// Cache maintenance handlers.
//
// DELETE /api/cache       drop every cached profile
// GET    /api/cache-stats size plus per-entry age

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::web::AppState;

pub async fn clear_cache(State(state): State<AppState>) -> impl IntoResponse {
    state.resolver.clear_cache();
    Json(serde_json::json!({ "success": true, "message": "Cache cleared" }))
}

pub async fn cache_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.resolver.cache_stats())
}
