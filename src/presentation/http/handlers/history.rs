//! Conversation History Handler
//!
//! REST face of cursor-paginated message retrieval. The caller must be a
//! participant of the conversation (direct) or an active member of its
//! group.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::presentation::ws::MessageView;
use crate::shared::error::AppError;
use crate::startup::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    /// Cursor: only messages strictly older than this message are returned.
    /// An unresolvable cursor falls back to the newest page.
    pub before: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub messages: Vec<MessageView>,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_message_id: Option<String>,
}

/// GET /conversations/{conversation_id}/messages
pub async fn get_conversation_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
    headers: HeaderMap,
) -> Result<Json<HistoryResponse>, AppError> {
    let token = bearer_token(&headers)?;
    let user_id = state.verifier.verify(token).await?;

    state.chat.authorize_viewer(conversation_id, user_id).await?;

    let history = state
        .chat
        .get_messages(conversation_id, query.limit, query.before)
        .await?;

    // Opening a conversation clears the reader's unread counter.
    state.chat.mark_read(conversation_id, user_id).await?;

    Ok(Json(HistoryResponse {
        messages: history.messages.iter().map(MessageView::from).collect(),
        has_more: history.has_more,
        oldest_message_id: history.oldest_message_id.map(|id| id.to_string()),
    }))
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Authentication("Missing bearer token".into()))
}
