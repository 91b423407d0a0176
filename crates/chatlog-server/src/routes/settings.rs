//! Popup settings.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};

use chatlog_store::{keys, KvStore};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/settings", get(get_settings))
        .route("/settings/dark-mode/toggle", put(toggle_dark_mode))
}

fn read_dark_mode(store: &dyn KvStore) -> chatlog_core::Result<bool> {
    Ok(store
        .get(keys::DARK_MODE)?
        .and_then(|v| v.as_bool())
        .unwrap_or(false))
}

async fn get_settings(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match read_dark_mode(&*state.store) {
        Ok(dark_mode) => (StatusCode::OK, Json(serde_json::json!({ "darkMode": dark_mode }))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}

/// PUT /api/settings/dark-mode/toggle: flip and return the new value.
async fn toggle_dark_mode(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let toggled = read_dark_mode(&*state.store).and_then(|current| {
        state
            .store
            .set(vec![(keys::DARK_MODE.to_string(), serde_json::json!(!current))])?;
        Ok(!current)
    });

    match toggled {
        Ok(dark_mode) => (StatusCode::OK, Json(serde_json::json!({ "darkMode": dark_mode }))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}
