// Skin lookup handlers.
//
// GET  /api/skins            every roster player in one batch; the main
//                             endpoint, called once per page load
// GET  /api/skin/{username}  single player
// POST /api/batch-uuids      explicit list of up to 50 names
//
// /api/skins never fails with a 5xx: the front end falls back to default
// avatars when `skins` is empty.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::roster::load_roster;
use crate::upstream::request::MAX_BATCH_SIZE;
use crate::web::{api_error, AppState};

/// GET /api/skins: resolve the whole roster.
pub async fn all_skins(State(state): State<AppState>) -> Response {
    let Some(path) = state.roster_path.as_deref() else {
        return Json(json!({
            "total": 0,
            "loaded": 0,
            "skins": {},
            "error": "No roster configured",
        }))
        .into_response();
    };

    let usernames = match load_roster(path).await {
        Ok(names) => names,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load roster");
            return Json(json!({
                "total": 0,
                "loaded": 0,
                "skins": {},
                "error": "Failed to fetch skins, using default avatars",
            }))
            .into_response();
        }
    };

    let skins = state.resolver.resolve_many(&usernames).await;

    Json(json!({
        "total": usernames.len(),
        "loaded": skins.len(),
        "skins": skins,
    }))
    .into_response()
}

/// GET /api/skin/{username}: single player by name. `headUrl` repeats the
/// skin URL; the front end crops the head from the skin texture.
pub async fn get_skin(State(state): State<AppState>, Path(username): Path<String>) -> Response {
    let username = username.trim();
    if username.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "Username is required");
    }

    match state.resolver.resolve_one(username).await {
        Some(profile) => Json(json!({
            "username": username,
            "id": profile.player_id,
            "headUrl": profile.texture_url,
            "textureUrl": profile.texture_url,
        }))
        .into_response(),
        None => api_error(
            StatusCode::NOT_FOUND,
            &format!("Player {username} not found"),
        ),
    }
}

#[derive(Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub usernames: Vec<String>,
}

/// POST /api/batch-uuids: resolve an explicit list.
pub async fn batch_uuids(
    State(state): State<AppState>,
    Json(body): Json<BatchRequest>,
) -> Response {
    if body.usernames.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "Usernames array is required");
    }
    if body.usernames.len() > MAX_BATCH_SIZE {
        return api_error(
            StatusCode::BAD_REQUEST,
            &format!("Maximum {MAX_BATCH_SIZE} usernames per request"),
        );
    }

    let players = state.resolver.resolve_many(&body.usernames).await;
    Json(json!({
        "count": players.len(),
        "players": players,
    }))
    .into_response()
}
