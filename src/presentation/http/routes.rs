//! Route Configuration

use axum::{routing::get, Router};

use super::handlers;
use crate::presentation::ws::ws_handler;
use crate::startup::AppState;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // WebSocket gateway endpoint
        .route("/ws", get(ws_handler))
        // Health check
        .route("/health", get(handlers::health::health_check))
        // Conversation history (REST face of cursor pagination)
        .route(
            "/conversations/{conversation_id}/messages",
            get(handlers::history::get_conversation_messages),
        )
        .with_state(state)
}
