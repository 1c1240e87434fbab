use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::row_parsers::{db_user_from_row, USER_COLUMNS};
use crate::authz::Role;
use crate::errors::{AppError, AppResult};
use crate::models::user::DbUser;
use crate::services::store::{CredentialStore, RefreshTokenStore, RotateOutcome};
use crate::utils::{utc_now, verify_password};

/// SQLite-backed credential and refresh-token store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_user(&self, name: &str, email: &str, password_hash: &str, role: Role) -> AppResult<DbUser> {
        ensure_email_available(&self.pool, email).await?;

        let user_id = Uuid::new_v4();
        let now = utc_now().to_rfc3339();

        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id.to_string())
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::internal("user vanished after insert"))
    }

    pub async fn find_user_by_id(&self, user_id: Uuid) -> AppResult<Option<DbUser>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ? AND deleted_at IS NULL");
        let row = sqlx::query(&sql)
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(db_user_from_row).transpose()
    }

    /// Changes the role and drops the user's refresh token so the next
    /// session carries the new role.
    pub async fn update_role(&self, user_id: Uuid, role: Role) -> AppResult<DbUser> {
        let result = sqlx::query(
            "UPDATE users SET role = ?, refresh_token_hash = NULL, refresh_expires_at = NULL, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(role.as_str())
        .bind(utc_now().to_rfc3339())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("user not found"));
        }

        self.find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))
    }

    pub async fn soft_delete_user(&self, user_id: Uuid) -> AppResult<()> {
        let now = utc_now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE users SET deleted_at = ?, updated_at = ?, refresh_token_hash = NULL, refresh_expires_at = NULL WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&now)
        .bind(&now)
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("user not found"));
        }

        Ok(())
    }
}

async fn ensure_email_available(pool: &SqlitePool, email: &str) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ? AND deleted_at IS NULL")
        .bind(email)
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Err(AppError::conflict("email already in use"));
    }

    Ok(())
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<DbUser>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ? AND deleted_at IS NULL");
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(db_user_from_row).transpose()
    }

    async fn verify_password_hash(&self, password: &str, password_hash: &str) -> AppResult<bool> {
        let password = password.to_owned();
        let password_hash = password_hash.to_owned();

        // argon2 is deliberately slow; keep it off the async workers
        tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
            .await
            .map_err(|err| AppError::internal(format!("password verification task failed: {err}")))?
    }

    async fn get_role(&self, user_id: Uuid) -> AppResult<Option<Role>> {
        let role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE id = ? AND deleted_at IS NULL")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        role.map(|r| r.parse::<Role>()).transpose()
    }
}

#[async_trait]
impl RefreshTokenStore for SqliteStore {
    async fn store_refresh_token(&self, user_id: Uuid, token_hash: &str, expires_at: i64) -> AppResult<()> {
        sqlx::query(
            "UPDATE users SET refresh_token_hash = ?, refresh_expires_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(token_hash)
        .bind(expires_at)
        .bind(utc_now().to_rfc3339())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        user_id: Uuid,
        old_hash: &str,
        new_hash: &str,
        new_expires_at: i64,
        now: i64,
    ) -> AppResult<RotateOutcome> {
        let mut tx = self.pool.begin().await?;

        // Keyed on the current value: SQLite serializes writers, so only one
        // caller can see the old hash here.
        let swapped = sqlx::query(
            "UPDATE users SET refresh_token_hash = ?, refresh_expires_at = ?, updated_at = ? \
             WHERE id = ? AND refresh_token_hash = ? AND refresh_expires_at > ? AND deleted_at IS NULL",
        )
        .bind(new_hash)
        .bind(new_expires_at)
        .bind(utc_now().to_rfc3339())
        .bind(user_id.to_string())
        .bind(old_hash)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if swapped.rows_affected() == 1 {
            sqlx::query(
                "INSERT OR IGNORE INTO spent_refresh_tokens (token_hash, user_id, spent_at, expires_at) VALUES (?, ?, ?, ?)",
            )
            .bind(old_hash)
            .bind(user_id.to_string())
            .bind(utc_now().to_rfc3339())
            .bind(new_expires_at)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM spent_refresh_tokens WHERE user_id = ? AND expires_at <= ?")
                .bind(user_id.to_string())
                .bind(now)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            return Ok(RotateOutcome::Rotated);
        }

        let spent: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM spent_refresh_tokens WHERE token_hash = ? AND user_id = ?")
                .bind(old_hash)
                .bind(user_id.to_string())
                .fetch_optional(&mut *tx)
                .await?;

        if spent.is_none() {
            tx.rollback().await?;
            return Ok(RotateOutcome::Rejected);
        }

        sqlx::query("UPDATE users SET refresh_token_hash = NULL, refresh_expires_at = NULL, updated_at = ? WHERE id = ?")
            .bind(utc_now().to_rfc3339())
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(RotateOutcome::Reused)
    }

    async fn revoke_refresh_token(&self, user_id: Uuid, token_hash: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token_hash = NULL, refresh_expires_at = NULL, updated_at = ? \
             WHERE id = ? AND refresh_token_hash = ?",
        )
        .bind(utc_now().to_rfc3339())
        .bind(user_id.to_string())
        .bind(token_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE users SET refresh_token_hash = NULL, refresh_expires_at = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(utc_now().to_rfc3339())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
