//! Chat Service
//!
//! Persistence orchestration for the dispatcher: conversation
//! find-or-create, message append, unread bookkeeping, and cursor
//! pagination over history.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{
    Conversation, ConversationRepository, LastMessage, MembershipStore, Message, MessageCursor,
    MessageRepository, ReceiverType,
};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Maximum message content length in characters
const MAX_CONTENT_LENGTH: usize = 4000;

/// Default and maximum page sizes for history retrieval
const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 100;

/// One page of conversation history, oldest to newest.
#[derive(Debug, Clone)]
pub struct MessageHistory {
    pub messages: Vec<Message>,
    /// Heuristic: true when the page came back full, so an older page may
    /// exist. Not an exact count.
    pub has_more: bool,
    /// Cursor for the next (older) page
    pub oldest_message_id: Option<i64>,
}

/// Chat persistence service trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Persist a direct message, creating the conversation lazily on the
    /// first message between the pair.
    async fn record_direct_message(
        &self,
        sender_id: i64,
        receiver_id: i64,
        content: &str,
    ) -> Result<Message, AppError>;

    /// Persist a group message into the group's conversation.
    ///
    /// The caller must have authorized the sender's membership already.
    async fn record_group_message(
        &self,
        sender_id: i64,
        group_id: i64,
        content: &str,
    ) -> Result<Message, AppError>;

    /// Cursor-paginated history retrieval.
    async fn get_messages(
        &self,
        conversation_id: i64,
        limit: Option<i64>,
        before_message_id: Option<i64>,
    ) -> Result<MessageHistory, AppError>;

    /// Authorize read access to a conversation: direct participant, or
    /// active member of the bound group.
    async fn authorize_viewer(
        &self,
        conversation_id: i64,
        user_id: i64,
    ) -> Result<Conversation, AppError>;

    /// Reset a user's unread counter for a conversation.
    async fn mark_read(&self, conversation_id: i64, user_id: i64) -> Result<(), AppError>;
}

/// ChatService implementation over repository traits
pub struct ChatServiceImpl<M, C, G>
where
    M: MessageRepository,
    C: ConversationRepository,
    G: MembershipStore,
{
    messages: Arc<M>,
    conversations: Arc<C>,
    membership: Arc<G>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<M, C, G> ChatServiceImpl<M, C, G>
where
    M: MessageRepository,
    C: ConversationRepository,
    G: MembershipStore,
{
    pub fn new(
        messages: Arc<M>,
        conversations: Arc<C>,
        membership: Arc<G>,
        id_generator: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            messages,
            conversations,
            membership,
            id_generator,
        }
    }

    fn validate_content(content: &str) -> Result<(), AppError> {
        if content.trim().is_empty() {
            return Err(AppError::Validation("Message content is required".into()));
        }
        if content.chars().count() > MAX_CONTENT_LENGTH {
            return Err(AppError::Validation("Message content too long".into()));
        }
        Ok(())
    }

    /// Symmetric lookup, then upsert-create on miss. The repository's
    /// create is keyed on the normalized pair, so a concurrent creation
    /// between the same users resolves to a single row.
    async fn find_or_create_direct(&self, a: i64, b: i64) -> Result<Conversation, AppError> {
        if let Some(conversation) = self.conversations.find_direct(a, b).await? {
            return Ok(conversation);
        }
        self.conversations
            .create_direct(self.id_generator.generate(), a, b)
            .await
    }

    /// Append a message and update the conversation record.
    ///
    /// Write order is fixed: message insert before conversation update, so
    /// a crash in between never leaves a preview for a message that does
    /// not exist.
    async fn append(
        &self,
        conversation_id: i64,
        sender_id: i64,
        receiver_type: ReceiverType,
        receiver_id: i64,
        content: &str,
        unread_targets: &[i64],
    ) -> Result<Message, AppError> {
        let message = Message {
            id: self.id_generator.generate(),
            conversation_id,
            sender_id,
            receiver_type,
            receiver_id,
            content: content.to_string(),
            deleted: false,
            created_at: Utc::now(),
        };

        let created = self.messages.create(&message).await?;

        let snapshot = LastMessage {
            message_id: created.id,
            sender_id: created.sender_id,
            content: created.content.clone(),
            sent_at: created.created_at,
        };
        self.conversations
            .set_last_message(conversation_id, &snapshot)
            .await?;
        if !unread_targets.is_empty() {
            self.conversations
                .increment_unread(conversation_id, unread_targets)
                .await?;
        }

        Ok(created)
    }
}

#[async_trait]
impl<M, C, G> ChatService for ChatServiceImpl<M, C, G>
where
    M: MessageRepository + 'static,
    C: ConversationRepository + 'static,
    G: MembershipStore + 'static,
{
    async fn record_direct_message(
        &self,
        sender_id: i64,
        receiver_id: i64,
        content: &str,
    ) -> Result<Message, AppError> {
        Self::validate_content(content)?;
        if sender_id == receiver_id {
            return Err(AppError::Validation("Cannot message yourself".into()));
        }

        let conversation = self.find_or_create_direct(sender_id, receiver_id).await?;

        self.append(
            conversation.id,
            sender_id,
            ReceiverType::User,
            receiver_id,
            content,
            &[receiver_id],
        )
        .await
    }

    async fn record_group_message(
        &self,
        sender_id: i64,
        group_id: i64,
        content: &str,
    ) -> Result<Message, AppError> {
        Self::validate_content(content)?;

        let conversation = self
            .conversations
            .find_by_group(group_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Group {} has no conversation", group_id)))?;

        let unread_targets: Vec<i64> = self
            .membership
            .active_member_ids(group_id)
            .await?
            .into_iter()
            .filter(|id| *id != sender_id)
            .collect();

        self.append(
            conversation.id,
            sender_id,
            ReceiverType::Group,
            group_id,
            content,
            &unread_targets,
        )
        .await
    }

    async fn get_messages(
        &self,
        conversation_id: i64,
        limit: Option<i64>,
        before_message_id: Option<i64>,
    ) -> Result<MessageHistory, AppError> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

        // An unresolvable cursor falls back to unfiltered retrieval rather
        // than erroring; callers see the newest page again.
        let cursor = match before_message_id {
            Some(id) => match self.messages.find_by_id(id).await? {
                Some(ref anchor) => Some(MessageCursor::from(anchor)),
                None => {
                    tracing::debug!(
                        conversation_id,
                        before_message_id = id,
                        "Pagination cursor unresolvable, ignoring"
                    );
                    None
                }
            },
            None => None,
        };

        let mut messages = self
            .messages
            .find_page(conversation_id, limit, cursor)
            .await?;

        let has_more = messages.len() as i64 == limit;
        let oldest_message_id = messages.last().map(|m| m.id);
        messages.reverse(); // newest-first in storage, oldest-first for callers

        Ok(MessageHistory {
            messages,
            has_more,
            oldest_message_id,
        })
    }

    async fn authorize_viewer(
        &self,
        conversation_id: i64,
        user_id: i64,
    ) -> Result<Conversation, AppError> {
        let conversation = self
            .conversations
            .find_by_id(conversation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Conversation {} not found", conversation_id)))?;

        let allowed = match conversation.group_id {
            Some(group_id) => self.membership.is_active_member(group_id, user_id).await?,
            None => conversation.has_participant(user_id),
        };

        if !allowed {
            return Err(AppError::Authorization(
                "Not a participant of this conversation".into(),
            ));
        }

        Ok(conversation)
    }

    async fn mark_read(&self, conversation_id: i64, user_id: i64) -> Result<(), AppError> {
        self.conversations
            .reset_unread(conversation_id, user_id)
            .await
    }
}
