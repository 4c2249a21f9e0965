//! Common Test Utilities
//!
//! In-memory fakes for the persistence and membership collaborators, and a
//! test backend wiring them into a real dispatcher without a live
//! transport.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use chat_relay::application::{ChatService, ChatServiceImpl};
use chat_relay::domain::{
    Conversation, ConversationKind, ConversationRepository, IdentityVerifier, LastMessage,
    MembershipStore, Message, MessageCursor, MessageRepository,
};
use chat_relay::presentation::ws::{
    ConnectionId, ConnectionRegistry, Dispatcher, RoomManager, ServerEvent,
};
use chat_relay::shared::error::AppError;
use chat_relay::shared::snowflake::SnowflakeGenerator;

/// In-memory message store with the same cursor semantics as the Postgres
/// implementation: newest-first on `(created_at, id)`, strictly-older
/// filtering.
#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: Mutex<Vec<Message>>,
    fail_next_write: AtomicBool,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next create call fail with a persistence error.
    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    pub fn all(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn create(&self, message: &Message) -> Result<Message, AppError> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(AppError::Internal("message store unavailable".into()));
        }
        self.messages.lock().unwrap().push(message.clone());
        Ok(message.clone())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == id)
            .cloned())
    }

    async fn find_page(
        &self,
        conversation_id: i64,
        limit: i64,
        before: Option<MessageCursor>,
    ) -> Result<Vec<Message>, AppError> {
        let mut page: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.conversation_id == conversation_id && !m.deleted)
            .filter(|m| match before {
                Some(cursor) => (m.created_at, m.id) < (cursor.created_at, cursor.id),
                None => true,
            })
            .cloned()
            .collect();
        page.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        page.truncate(limit as usize);
        Ok(page)
    }

    async fn count_by_conversation(&self, conversation_id: i64) -> Result<i64, AppError> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.conversation_id == conversation_id && !m.deleted)
            .count() as i64)
    }
}

/// In-memory conversation store with upsert semantics on the normalized
/// direct pair.
#[derive(Default)]
pub struct InMemoryConversationRepository {
    conversations: Mutex<Vec<Conversation>>,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: i64) -> Option<Conversation> {
        self.conversations
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.conversations.lock().unwrap().len()
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn find_direct(&self, a: i64, b: i64) -> Result<Option<Conversation>, AppError> {
        let pair = Conversation::normalize_pair(a, b);
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .find(|c| {
                c.kind == ConversationKind::Direct
                    && !c.deleted
                    && c.participants.len() == 2
                    && Conversation::normalize_pair(c.participants[0], c.participants[1]) == pair
            })
            .cloned())
    }

    async fn create_direct(&self, id: i64, a: i64, b: i64) -> Result<Conversation, AppError> {
        if let Some(existing) = self.find_direct(a, b).await? {
            return Ok(existing);
        }
        let (low, high) = Conversation::normalize_pair(a, b);
        let conversation = Conversation {
            id,
            kind: ConversationKind::Direct,
            participants: vec![low, high],
            group_id: None,
            last_message: None,
            unread: HashMap::new(),
            deleted: false,
            created_at: chrono::Utc::now(),
        };
        self.conversations.lock().unwrap().push(conversation.clone());
        Ok(conversation)
    }

    async fn find_by_group(&self, group_id: i64) -> Result<Option<Conversation>, AppError> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.group_id == Some(group_id) && !c.deleted)
            .cloned())
    }

    async fn create_group(&self, id: i64, group_id: i64) -> Result<Conversation, AppError> {
        if let Some(existing) = self.find_by_group(group_id).await? {
            return Ok(existing);
        }
        let conversation = Conversation {
            id,
            kind: ConversationKind::Group,
            participants: Vec::new(),
            group_id: Some(group_id),
            last_message: None,
            unread: HashMap::new(),
            deleted: false,
            created_at: chrono::Utc::now(),
        };
        self.conversations.lock().unwrap().push(conversation.clone());
        Ok(conversation)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Conversation>, AppError> {
        Ok(self.get(id))
    }

    async fn set_last_message(
        &self,
        conversation_id: i64,
        snapshot: &LastMessage,
    ) -> Result<(), AppError> {
        let mut conversations = self.conversations.lock().unwrap();
        let conversation = conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
            .ok_or_else(|| AppError::NotFound(format!("Conversation {}", conversation_id)))?;
        conversation.last_message = Some(snapshot.clone());
        Ok(())
    }

    async fn increment_unread(
        &self,
        conversation_id: i64,
        user_ids: &[i64],
    ) -> Result<(), AppError> {
        let mut conversations = self.conversations.lock().unwrap();
        let conversation = conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
            .ok_or_else(|| AppError::NotFound(format!("Conversation {}", conversation_id)))?;
        for user_id in user_ids {
            *conversation.unread.entry(*user_id).or_insert(0) += 1;
        }
        Ok(())
    }

    async fn reset_unread(&self, conversation_id: i64, user_id: i64) -> Result<(), AppError> {
        let mut conversations = self.conversations.lock().unwrap();
        if let Some(conversation) = conversations.iter_mut().find(|c| c.id == conversation_id) {
            conversation.unread.insert(user_id, 0);
        }
        Ok(())
    }
}

/// In-memory membership store: group -> (user, is_admin) pairs.
#[derive(Default)]
pub struct InMemoryMembership {
    groups: Mutex<HashMap<i64, Vec<(i64, bool)>>>,
}

impl InMemoryMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(&self, group_id: i64, user_id: i64) {
        self.groups
            .lock()
            .unwrap()
            .entry(group_id)
            .or_default()
            .push((user_id, false));
    }

    pub fn add_admin(&self, group_id: i64, user_id: i64) {
        self.groups
            .lock()
            .unwrap()
            .entry(group_id)
            .or_default()
            .push((user_id, true));
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembership {
    async fn is_active_member(&self, group_id: i64, user_id: i64) -> Result<bool, AppError> {
        Ok(self
            .groups
            .lock()
            .unwrap()
            .get(&group_id)
            .map(|members| members.iter().any(|(id, _)| *id == user_id))
            .unwrap_or(false))
    }

    async fn is_admin(&self, group_id: i64, user_id: i64) -> Result<bool, AppError> {
        Ok(self
            .groups
            .lock()
            .unwrap()
            .get(&group_id)
            .map(|members| members.iter().any(|(id, admin)| *id == user_id && *admin))
            .unwrap_or(false))
    }

    async fn active_member_ids(&self, group_id: i64) -> Result<Vec<i64>, AppError> {
        Ok(self
            .groups
            .lock()
            .unwrap()
            .get(&group_id)
            .map(|members| members.iter().map(|(id, _)| *id).collect())
            .unwrap_or_default())
    }
}

/// Verifier accepting tokens of the form "token-<user_id>".
pub struct StaticVerifier;

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<i64, AppError> {
        token
            .strip_prefix("token-")
            .and_then(|id| id.parse().ok())
            .ok_or_else(|| AppError::Authentication("Invalid token".into()))
    }
}

/// A fully wired real-time core over in-memory stores.
pub struct TestBackend {
    pub dispatcher: Arc<Dispatcher>,
    pub chat: Arc<dyn ChatService>,
    pub messages: Arc<InMemoryMessageRepository>,
    pub conversations: Arc<InMemoryConversationRepository>,
    pub membership: Arc<InMemoryMembership>,
}

impl TestBackend {
    pub fn new() -> Self {
        let messages = Arc::new(InMemoryMessageRepository::new());
        let conversations = Arc::new(InMemoryConversationRepository::new());
        let membership = Arc::new(InMemoryMembership::new());
        let snowflake = Arc::new(SnowflakeGenerator::new(1));

        let chat: Arc<dyn ChatService> = Arc::new(ChatServiceImpl::new(
            Arc::clone(&messages),
            Arc::clone(&conversations),
            Arc::clone(&membership),
            snowflake,
        ));

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(ConnectionRegistry::new()),
            Arc::new(RoomManager::new()),
            Arc::clone(&chat),
            Arc::clone(&membership) as Arc<dyn MembershipStore>,
            Arc::new(StaticVerifier),
        ));

        Self {
            dispatcher,
            chat,
            messages,
            conversations,
            membership,
        }
    }

    /// Open an Active connection for a user, returning its ID and the
    /// stream of events it receives.
    pub fn connect(&self, user_id: i64) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let connection_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.dispatcher.connect(user_id, connection_id, tx);
        (connection_id, rx)
    }
}

impl Default for TestBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain everything currently queued on a connection's event stream.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
