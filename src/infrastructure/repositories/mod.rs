//! PostgreSQL repository implementations.

pub mod conversation_repository;
pub mod membership_repository;
pub mod message_repository;

pub use conversation_repository::PgConversationRepository;
pub use membership_repository::PgMembershipStore;
pub use message_repository::PgMessageRepository;
