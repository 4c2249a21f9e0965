//! Conversation Repository Implementation
//!
//! PostgreSQL implementation of the denormalized conversation record.
//! Direct conversations are keyed on the normalized `(user_low,
//! user_high)` pair with a uniqueness constraint, so concurrent
//! find-or-create between the same users cannot produce duplicates.
//! Unread counters live in a companion `conversation_unread` table and
//! are loaded separately.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::domain::{Conversation, ConversationKind, ConversationRepository, LastMessage};
use crate::shared::error::AppError;

/// PostgreSQL conversation repository.
pub struct PgConversationRepository {
    pool: PgPool,
}

impl PgConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load the per-user unread counters for a conversation.
    async fn load_unread(&self, conversation_id: i64) -> Result<HashMap<i64, i64>, AppError> {
        let rows = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT user_id, count FROM conversation_unread
            WHERE conversation_id = $1
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn hydrate(&self, row: ConversationRow) -> Result<Conversation, AppError> {
        let unread = self.load_unread(row.id).await?;
        Ok(row.into_conversation(unread))
    }
}

/// Internal row type mapping the `conversations` table.
#[derive(Debug, sqlx::FromRow)]
struct ConversationRow {
    id: i64,
    kind: String,
    user_low: Option<i64>,
    user_high: Option<i64>,
    group_id: Option<i64>,
    last_message: Option<Json<LastMessage>>,
    deleted: bool,
    created_at: DateTime<Utc>,
}

impl ConversationRow {
    fn into_conversation(self, unread: HashMap<i64, i64>) -> Conversation {
        let participants = match (self.user_low, self.user_high) {
            (Some(low), Some(high)) => vec![low, high],
            _ => Vec::new(),
        };
        Conversation {
            id: self.id,
            kind: ConversationKind::from_str(&self.kind),
            participants,
            group_id: self.group_id,
            last_message: self.last_message.map(|Json(snapshot)| snapshot),
            unread,
            deleted: self.deleted,
            created_at: self.created_at,
        }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, kind, user_low, user_high, group_id, last_message, deleted, created_at
    FROM conversations
"#;

#[async_trait]
impl ConversationRepository for PgConversationRepository {
    async fn find_direct(&self, a: i64, b: i64) -> Result<Option<Conversation>, AppError> {
        let (low, high) = Conversation::normalize_pair(a, b);

        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "{} WHERE kind = 'direct' AND user_low = $1 AND user_high = $2 AND deleted = FALSE",
            SELECT_COLUMNS
        ))
        .bind(low)
        .bind(high)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn create_direct(&self, id: i64, a: i64, b: i64) -> Result<Conversation, AppError> {
        let (low, high) = Conversation::normalize_pair(a, b);

        // Upsert on the normalized pair: a concurrent creation between the
        // same users leaves exactly one row, and the re-read below returns
        // whichever insert won.
        sqlx::query(
            r#"
            INSERT INTO conversations (id, kind, user_low, user_high, deleted, created_at)
            VALUES ($1, 'direct', $2, $3, FALSE, NOW())
            ON CONFLICT (user_low, user_high) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(low)
        .bind(high)
        .execute(&self.pool)
        .await?;

        self.find_direct(low, high).await?.ok_or_else(|| {
            AppError::Internal(format!(
                "Direct conversation for ({}, {}) missing after upsert",
                low, high
            ))
        })
    }

    async fn find_by_group(&self, group_id: i64) -> Result<Option<Conversation>, AppError> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "{} WHERE kind = 'group' AND group_id = $1 AND deleted = FALSE",
            SELECT_COLUMNS
        ))
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn create_group(&self, id: i64, group_id: i64) -> Result<Conversation, AppError> {
        sqlx::query(
            r#"
            INSERT INTO conversations (id, kind, group_id, deleted, created_at)
            VALUES ($1, 'group', $2, FALSE, NOW())
            ON CONFLICT (group_id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(group_id)
        .execute(&self.pool)
        .await?;

        self.find_by_group(group_id).await?.ok_or_else(|| {
            AppError::Internal(format!(
                "Group conversation for {} missing after upsert",
                group_id
            ))
        })
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Conversation>, AppError> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "{} WHERE id = $1 AND deleted = FALSE",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn set_last_message(
        &self,
        conversation_id: i64,
        snapshot: &LastMessage,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE conversations SET last_message = $2 WHERE id = $1
            "#,
        )
        .bind(conversation_id)
        .bind(Json(snapshot))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Conversation {} not found",
                conversation_id
            )));
        }

        Ok(())
    }

    async fn increment_unread(
        &self,
        conversation_id: i64,
        user_ids: &[i64],
    ) -> Result<(), AppError> {
        if user_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO conversation_unread (conversation_id, user_id, count)
            SELECT $1, unnest($2::bigint[]), 1
            ON CONFLICT (conversation_id, user_id)
            DO UPDATE SET count = conversation_unread.count + 1
            "#,
        )
        .bind(conversation_id)
        .bind(user_ids)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn reset_unread(&self, conversation_id: i64, user_id: i64) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO conversation_unread (conversation_id, user_id, count)
            VALUES ($1, $2, 0)
            ON CONFLICT (conversation_id, user_id) DO UPDATE SET count = 0
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
