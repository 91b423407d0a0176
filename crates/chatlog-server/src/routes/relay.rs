//! Relay routes: page observations and control commands from the extension.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use tracing::debug;

use chatlog_capture::{ControlCommand, PageEvent};

use super::session_unavailable;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/relay/events", post(post_events))
        .route("/relay/control", post(post_control))
}

/// POST /api/relay/events: a batch of page events, applied in order.
async fn post_events(
    State(state): State<Arc<AppState>>,
    Json(events): Json<Vec<PageEvent>>,
) -> impl IntoResponse {
    let count = events.len();
    for event in events {
        if let Err(e) = state.session.page_event(event) {
            return session_unavailable(e);
        }
    }
    debug!("Relayed {} page events", count);
    (
        StatusCode::OK,
        Json(serde_json::json!({ "success": true, "accepted": count })),
    )
}

/// POST /api/relay/control: `{"action": "resetData"}`.
async fn post_control(
    State(state): State<Arc<AppState>>,
    Json(command): Json<ControlCommand>,
) -> impl IntoResponse {
    match state.session.control(command) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "success": true }))),
        Err(e) => session_unavailable(e),
    }
}
