//! Message Repository Implementation
//!
//! PostgreSQL implementation of message persistence with keyset pagination
//! for reverse-chronological history retrieval.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Message, MessageCursor, MessageRepository, ReceiverType};
use crate::shared::error::AppError;

/// PostgreSQL message repository.
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type mapping the `messages` table.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i64,
    conversation_id: i64,
    sender_id: i64,
    receiver_type: String,
    receiver_id: i64,
    content: String,
    deleted: bool,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            receiver_type: ReceiverType::from_str(&self.receiver_type),
            receiver_id: self.receiver_id,
            content: self.content,
            deleted: self.deleted,
            created_at: self.created_at,
        }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(&self, message: &Message) -> Result<Message, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (id, conversation_id, sender_id, receiver_type,
                                  receiver_id, content, deleted, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, conversation_id, sender_id, receiver_type,
                      receiver_id, content, deleted, created_at
            "#,
        )
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(message.receiver_type.as_str())
        .bind(message.receiver_id)
        .bind(&message.content)
        .bind(message.deleted)
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_message())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, conversation_id, sender_id, receiver_type,
                   receiver_id, content, deleted, created_at
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_message()))
    }

    /// Keyset pagination on `(created_at, id)` descending. The composite
    /// key keeps pages gap-free when timestamps collide.
    async fn find_page(
        &self,
        conversation_id: i64,
        limit: i64,
        before: Option<MessageCursor>,
    ) -> Result<Vec<Message>, AppError> {
        let rows = match before {
            Some(cursor) => {
                sqlx::query_as::<_, MessageRow>(
                    r#"
                    SELECT id, conversation_id, sender_id, receiver_type,
                           receiver_id, content, deleted, created_at
                    FROM messages
                    WHERE conversation_id = $1
                      AND deleted = FALSE
                      AND (created_at, id) < ($2, $3)
                    ORDER BY created_at DESC, id DESC
                    LIMIT $4
                    "#,
                )
                .bind(conversation_id)
                .bind(cursor.created_at)
                .bind(cursor.id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, MessageRow>(
                    r#"
                    SELECT id, conversation_id, sender_id, receiver_type,
                           receiver_id, content, deleted, created_at
                    FROM messages
                    WHERE conversation_id = $1
                      AND deleted = FALSE
                    ORDER BY created_at DESC, id DESC
                    LIMIT $2
                    "#,
                )
                .bind(conversation_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(|r| r.into_message()).collect())
    }

    async fn count_by_conversation(&self, conversation_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = $1 AND deleted = FALSE",
        )
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
