use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::errors::AppError;
use crate::models::ChatRequest;
use crate::service::chat_service::ChatService;
use crate::stream::{event_stream_response, frame_turn};

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST `/api/chat` — streams typed events when `stream` is true, otherwise
/// answers with one buffered JSON payload.
pub async fn chat_handler(
    State(svc): State<ChatService>,
    Json(request): Json<ChatRequest>,
) -> Response {
    let stream = request.stream;

    let ctx = match svc.prepare_turn(request).await {
        Ok(ctx) => ctx,
        Err(err) => return error_response(&err),
    };

    if stream {
        return event_stream_response(frame_turn(svc, ctx));
    }

    match svc.complete_turn(ctx).await {
        Ok(response) => Json(response).into_response(),
        Err(err) if err.is_agent_unavailable() => error_response(&err),
        Err(err) => {
            error!("Agent run failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("Agent run failed: {err}") })),
            )
                .into_response()
        }
    }
}

/// GET `/api/health`
pub async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "chat-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET `/api/threads/{id}/messages` — stored history of a thread
pub async fn list_messages_handler(
    Path(id): Path<String>,
    State(svc): State<ChatService>,
) -> Response {
    match svc.get_messages(&id).await {
        Ok(msgs) => Json(msgs).into_response(),
        Err(e) => error_response(&e),
    }
}

// ── Helper ────────────────────────────────────────────────────────────────────

fn error_response(err: &AppError) -> Response {
    let status = if err.is_validation() {
        StatusCode::BAD_REQUEST
    } else if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if err.is_agent_unavailable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
