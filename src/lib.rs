pub mod agent;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod routes;
pub mod service;
pub mod store;
pub mod stream;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::routes::api_routes::{chat_handler, health_handler, list_messages_handler};
use crate::service::chat_service::ChatService;

/// Builds the HTTP router over a fully wired [`ChatService`].
pub fn app(chat_service: ChatService) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/threads/{id}/messages", get(list_messages_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(chat_service)
}
