//! Core domain entities and repository traits.

pub mod conversation;
pub mod message;

pub use conversation::{Conversation, ConversationKind, ConversationRepository, LastMessage};
pub use message::{Message, MessageCursor, MessageRepository, ReceiverType};
