//! Persistence seams consumed by the token issuer.

use async_trait::async_trait;
use uuid::Uuid;

use crate::authz::Role;
use crate::errors::AppResult;
use crate::models::user::DbUser;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Live (not deleted) user with this email.
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<DbUser>>;

    async fn verify_password_hash(&self, password: &str, password_hash: &str) -> AppResult<bool>;

    /// Current role of a live user.
    async fn get_role(&self, user_id: Uuid) -> AppResult<Option<Role>>;
}

/// Result of a conditional refresh-token swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateOutcome {
    Rotated,
    /// The presented token was exchanged before, at any point in the
    /// session's history; the session is revoked.
    Reused,
    /// Unknown, expired, or belonging to a revoked session.
    Rejected,
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Replace whatever refresh token the user held.
    async fn store_refresh_token(&self, user_id: Uuid, token_hash: &str, expires_at: i64) -> AppResult<()>;

    /// Swap `old_hash` for `new_hash` only if `old_hash` is still current and
    /// unexpired at `now`, remembering `old_hash` as spent. At most one
    /// concurrent caller observes `Rotated`.
    async fn rotate_refresh_token(
        &self,
        user_id: Uuid,
        old_hash: &str,
        new_hash: &str,
        new_expires_at: i64,
        now: i64,
    ) -> AppResult<RotateOutcome>;

    /// Clear the stored token if it matches. Returns whether anything changed.
    async fn revoke_refresh_token(&self, user_id: Uuid, token_hash: &str) -> AppResult<bool>;

    async fn revoke_all_for_user(&self, user_id: Uuid) -> AppResult<()>;
}
