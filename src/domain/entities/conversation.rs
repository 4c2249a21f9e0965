//! Conversation entity and repository trait.
//!
//! One denormalized record per direct pair or group, carrying the
//! last-message snapshot and per-user unread counters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::shared::error::AppError;

/// Conversation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    Direct,
    Group,
}

impl ConversationKind {
    pub fn from_str(s: &str) -> Self {
        match s {
            "group" => Self::Group,
            _ => Self::Direct,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
        }
    }
}

/// Denormalized preview of the newest message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastMessage {
    pub message_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

/// A persistent container for a sequence of messages between a fixed
/// participant set.
///
/// Invariant: exactly one direct conversation exists per unordered user
/// pair. The store normalizes the pair to `(low, high)` and enforces a
/// uniqueness constraint, so concurrent first-messages cannot create
/// duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Snowflake ID (primary key)
    pub id: i64,

    pub kind: ConversationKind,

    /// Participant user IDs. Exactly two for direct conversations; group
    /// membership lives with the group itself.
    pub participants: Vec<i64>,

    /// Bound group ID, 1:1 with the group, when kind is Group
    pub group_id: Option<i64>,

    /// Preview of the newest message
    pub last_message: Option<LastMessage>,

    /// Per-user unread counters, keyed by user ID
    pub unread: HashMap<i64, i64>,

    /// Soft-delete flag
    pub deleted: bool,

    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Normalize an unordered user pair to its canonical `(low, high)` key.
    pub fn normalize_pair(a: i64, b: i64) -> (i64, i64) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Unread count for a user, zero when absent.
    pub fn unread_for(&self, user_id: i64) -> i64 {
        self.unread.get(&user_id).copied().unwrap_or(0)
    }

    /// Whether the user is a direct participant of this conversation.
    pub fn has_participant(&self, user_id: i64) -> bool {
        self.participants.contains(&user_id)
    }
}

/// Repository trait for conversation data access.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Symmetric lookup of the direct conversation between two users.
    async fn find_direct(&self, a: i64, b: i64) -> Result<Option<Conversation>, AppError>;

    /// Create the direct conversation for a user pair.
    ///
    /// Must be an upsert keyed on the normalized pair: when a concurrent
    /// creation wins the race, the existing row is returned instead of a
    /// duplicate being inserted.
    async fn create_direct(&self, id: i64, a: i64, b: i64) -> Result<Conversation, AppError>;

    /// Lookup of the conversation bound to a group.
    async fn find_by_group(&self, group_id: i64) -> Result<Option<Conversation>, AppError>;

    /// Create the conversation for a group (called once alongside the group).
    async fn create_group(&self, id: i64, group_id: i64) -> Result<Conversation, AppError>;

    /// Find a conversation by ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<Conversation>, AppError>;

    /// Replace the last-message snapshot.
    async fn set_last_message(
        &self,
        conversation_id: i64,
        snapshot: &LastMessage,
    ) -> Result<(), AppError>;

    /// Increment the unread counter by one for each given user.
    async fn increment_unread(
        &self,
        conversation_id: i64,
        user_ids: &[i64],
    ) -> Result<(), AppError>;

    /// Reset a user's unread counter to zero.
    async fn reset_unread(&self, conversation_id: i64, user_id: i64) -> Result<(), AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_pair_is_symmetric() {
        assert_eq!(Conversation::normalize_pair(7, 3), (3, 7));
        assert_eq!(Conversation::normalize_pair(3, 7), (3, 7));
        assert_eq!(Conversation::normalize_pair(5, 5), (5, 5));
    }
}
