//! Membership Store Implementation
//!
//! PostgreSQL implementation of the group membership rule consumed by the
//! dispatcher. A member is active iff `removed_at` is null.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::MembershipStore;
use crate::shared::error::AppError;

/// PostgreSQL membership store.
#[derive(Clone)]
pub struct PgMembershipStore {
    pool: PgPool,
}

impl PgMembershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipStore for PgMembershipStore {
    async fn is_active_member(&self, group_id: i64, user_id: i64) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM group_members
                WHERE group_id = $1 AND user_id = $2 AND removed_at IS NULL
            )
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn is_admin(&self, group_id: i64, user_id: i64) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM group_members
                WHERE group_id = $1 AND user_id = $2
                  AND is_admin = TRUE AND removed_at IS NULL
            )
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn active_member_ids(&self, group_id: i64) -> Result<Vec<i64>, AppError> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT user_id FROM group_members
            WHERE group_id = $1 AND removed_at IS NULL
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
