//! Session status.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use super::session_unavailable;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/status", get(get_status))
}

/// GET /api/status: binding state and log sizes of the capture session.
async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.session.status().await {
        Ok(status) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "session": status,
                "port": state.config.port,
                "dataDir": state.paths.root.display().to_string(),
            })),
        ),
        Err(e) => session_unavailable(e),
    }
}
