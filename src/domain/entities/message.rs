//! Message entity and repository trait.
//!
//! Maps to the `messages` table. Messages are immutable once created;
//! deletion is a state flag, history is never rewritten.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Delivery target of a message: a single user (direct) or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiverType {
    User,
    Group,
}

impl ReceiverType {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s {
            "group" => Self::Group,
            _ => Self::User,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
        }
    }
}

impl std::fmt::Display for ReceiverType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted chat message.
///
/// Ordering within a conversation is by `created_at`, ties broken by `id`
/// (snowflake IDs are time-ordered, so id order is insertion order).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Conversation this message belongs to
    pub conversation_id: i64,

    /// Sender user ID
    pub sender_id: i64,

    /// Whether the target is a user or a group
    pub receiver_type: ReceiverType,

    /// Target user or group ID
    pub receiver_id: i64,

    /// Message content
    pub content: String,

    /// Soft-delete flag
    pub deleted: bool,

    /// Timestamp when the message was sent
    pub created_at: DateTime<Utc>,
}

/// Keyset cursor for reverse-chronological pagination.
///
/// Rows strictly older than `(created_at, id)` in lexicographic order are
/// returned, which makes pagination gap-free even when timestamps collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageCursor {
    pub created_at: DateTime<Utc>,
    pub id: i64,
}

impl From<&Message> for MessageCursor {
    fn from(message: &Message) -> Self {
        Self {
            created_at: message.created_at,
            id: message.id,
        }
    }
}

/// Repository trait for message data access.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Persist a new message.
    async fn create(&self, message: &Message) -> Result<Message, AppError>;

    /// Find a message by its snowflake ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError>;

    /// Fetch a page of messages in a conversation, newest first.
    ///
    /// With a cursor, only messages strictly older than the cursor are
    /// returned.
    async fn find_page(
        &self,
        conversation_id: i64,
        limit: i64,
        before: Option<MessageCursor>,
    ) -> Result<Vec<Message>, AppError>;

    /// Count of messages in a conversation.
    async fn count_by_conversation(&self, conversation_id: i64) -> Result<i64, AppError>;
}
