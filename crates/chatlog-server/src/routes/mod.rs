//! HTTP route handlers for the extension relay and the popup.

pub mod relay;
pub mod settings;
pub mod status;
pub mod transcript;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(relay::routes())
        .merge(transcript::routes())
        .merge(settings::routes())
        .merge(status::routes())
}

pub(crate) fn session_unavailable(e: chatlog_core::Error) -> (StatusCode, Json<serde_json::Value>) {
    warn!("Capture session unavailable: {}", e);
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({ "error": e.to_string() })),
    )
}
