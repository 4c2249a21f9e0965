//! External collaborator capabilities consumed by the core.
//!
//! The core never reaches past these traits: token issuance and group
//! membership live elsewhere, tests substitute fakes.

use async_trait::async_trait;

use crate::shared::error::AppError;

/// "verify token -> identity" capability. Token issuance is external; the
/// core only consumes verification.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify a bearer token, returning the stable user ID it identifies.
    async fn verify(&self, token: &str) -> Result<i64, AppError>;
}

/// Group membership business rule. A member is active iff its removed-at
/// timestamp is null.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Whether the user is an active member of the group.
    async fn is_active_member(&self, group_id: i64, user_id: i64) -> Result<bool, AppError>;

    /// Whether the user is an active admin of the group.
    async fn is_admin(&self, group_id: i64, user_id: i64) -> Result<bool, AppError>;

    /// All active member IDs of the group (used for unread fan-out).
    async fn active_member_ids(&self, group_id: i64) -> Result<Vec<i64>, AppError>;
}
