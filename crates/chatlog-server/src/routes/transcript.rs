//! Transcript routes: live logs, Markdown downloads, clear all.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tracing::warn;

use chatlog_export::{export_filename, ExportError, ExportKind};

use super::session_unavailable;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/transcript", get(get_transcript).delete(clear_transcript))
        .route("/transcript/questions.md", get(get_questions_markdown))
        .route("/transcript/full.md", get(get_full_markdown))
}

/// GET /api/transcript: both logs as the session currently holds them.
async fn get_transcript(State(state): State<Arc<AppState>>) -> Response {
    match state.session.snapshot().await {
        Ok(transcript) => Json(transcript).into_response(),
        Err(e) => session_unavailable(e).into_response(),
    }
}

async fn get_questions_markdown(State(state): State<Arc<AppState>>) -> Response {
    markdown_download(&state, ExportKind::Questions).await
}

async fn get_full_markdown(State(state): State<Arc<AppState>>) -> Response {
    markdown_download(&state, ExportKind::FullConversation).await
}

async fn markdown_download(state: &AppState, kind: ExportKind) -> Response {
    let transcript = match state.session.snapshot().await {
        Ok(t) => t,
        Err(e) => return session_unavailable(e).into_response(),
    };

    match chatlog_export::render(kind, &transcript) {
        Ok(markdown) => {
            let filename = export_filename(kind, chrono::Local::now().date_naive());
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", filename),
                    ),
                ],
                markdown,
            )
                .into_response()
        }
        Err(ExportError::NoData) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "no data" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// DELETE /api/transcript: clear all. The removal is queued behind any
/// pending writes, so nothing captured before the call survives it.
async fn clear_transcript(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.session.clear_all().await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "success": true }))),
        Err(e) => {
            warn!("Failed to clear transcript: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
        }
    }
}
