use std::sync::Arc;

use serde_json::json;

use super::store::{CredentialStore, RefreshTokenStore, RotateOutcome};
use crate::errors::{AppError, AppResult};
use crate::events::{self, names, EventBus};
use crate::jwt::JwtConfig;
use crate::models::user::{AuthResponse, TokenPair, UserProfile};
use crate::utils::{generate_refresh_token, hash_refresh_token, normalize_email, refresh_token_owner, utc_now};

const TOKEN_TYPE: &str = "Bearer";

// Well-formed argon2id hash matching no password. Unknown emails are verified
// against it so they cost as much as a wrong password.
const DUMMY_PASSWORD_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$cpclQSPtuYyQSWb55Ph5Ng$+GomJ+9xQLv+jDKwcSDV3yBJyTa74Zr5vQTGe7Ww9E4";

/// Issues access tokens and rotates single-use refresh tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    credentials: Arc<dyn CredentialStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    jwt: Arc<JwtConfig>,
    refresh_ttl_seconds: i64,
    event_bus: EventBus,
}

impl TokenIssuer {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        jwt: Arc<JwtConfig>,
        refresh_ttl_seconds: i64,
        event_bus: EventBus,
    ) -> Self {
        Self {
            credentials,
            refresh_tokens,
            jwt,
            refresh_ttl_seconds,
            event_bus,
        }
    }

    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<AuthResponse> {
        let email = normalize_email(email);
        let Some(user) = self.credentials.find_user_by_email(&email).await? else {
            self.credentials.verify_password_hash(password, DUMMY_PASSWORD_HASH).await?;
            tracing::info!("login rejected: unknown email");
            events::publish(&self.event_bus, names::LOGIN_FAILED, None, None, json!({ "email": email }));
            return Err(AppError::InvalidCredentials);
        };

        if !self.credentials.verify_password_hash(password, &user.password_hash).await? {
            tracing::info!(user_id = %user.id, "login rejected: password mismatch");
            events::publish(&self.event_bus, names::LOGIN_FAILED, None, Some(user.id), json!({ "email": email }));
            return Err(AppError::InvalidCredentials);
        }

        let access_token = self.jwt.encode(user.id, user.role)?;
        let refresh_token = generate_refresh_token(user.id);
        let expires_at = utc_now().timestamp() + self.refresh_ttl_seconds;

        self.refresh_tokens
            .store_refresh_token(user.id, &hash_refresh_token(&refresh_token), expires_at)
            .await?;

        tracing::info!(user_id = %user.id, role = %user.role, "login succeeded");
        events::publish(
            &self.event_bus,
            names::LOGIN_SUCCEEDED,
            Some(user.id),
            Some(user.id),
            json!({ "role": user.role }),
        );

        Ok(AuthResponse {
            access_token,
            refresh_token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: self.jwt.expires_in(),
            user: UserProfile::from(&user),
        })
    }

    pub async fn refresh(&self, refresh_token: &str) -> AppResult<TokenPair> {
        let user_id = refresh_token_owner(refresh_token.trim())
            .ok_or_else(|| AppError::invalid_token("malformed refresh token"))?;

        let old_hash = hash_refresh_token(refresh_token.trim());
        let new_token = generate_refresh_token(user_id);
        let now = utc_now().timestamp();

        let outcome = self
            .refresh_tokens
            .rotate_refresh_token(
                user_id,
                &old_hash,
                &hash_refresh_token(&new_token),
                now + self.refresh_ttl_seconds,
                now,
            )
            .await?;

        // A concurrent loser lands in `Reused` too and revokes the winner's
        // fresh token, so two tabs racing on one token both end up signed out.
        match outcome {
            RotateOutcome::Rotated => {}
            RotateOutcome::Reused => {
                tracing::warn!(user_id = %user_id, "refresh token reuse detected, session revoked");
                events::publish(
                    &self.event_bus,
                    names::REFRESH_REUSE_DETECTED,
                    None,
                    Some(user_id),
                    json!({}),
                );
                return Err(AppError::invalid_token("refresh token already used"));
            }
            RotateOutcome::Rejected => {
                tracing::debug!(user_id = %user_id, "refresh token rejected");
                return Err(AppError::invalid_token("refresh token expired or revoked"));
            }
        }

        let Some(role) = self.credentials.get_role(user_id).await? else {
            // Account deleted between the swap and here.
            self.refresh_tokens.revoke_all_for_user(user_id).await?;
            return Err(AppError::invalid_token("account no longer exists"));
        };

        let access_token = self.jwt.encode(user_id, role)?;

        tracing::debug!(user_id = %user_id, "refresh token rotated");
        events::publish(&self.event_bus, names::TOKEN_REFRESHED, Some(user_id), Some(user_id), json!({}));

        Ok(TokenPair {
            access_token,
            refresh_token: new_token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: self.jwt.expires_in(),
        })
    }

    /// Idempotent: unknown, malformed or already revoked tokens are fine.
    pub async fn logout(&self, refresh_token: &str) -> AppResult<()> {
        let Some(user_id) = refresh_token_owner(refresh_token.trim()) else {
            return Ok(());
        };

        let revoked = self
            .refresh_tokens
            .revoke_refresh_token(user_id, &hash_refresh_token(refresh_token.trim()))
            .await?;

        if revoked {
            tracing::info!(user_id = %user_id, "logged out");
            events::publish(&self.event_bus, names::LOGGED_OUT, Some(user_id), Some(user_id), json!({}));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use uuid::Uuid;

    use crate::authz::Role;
    use crate::events::init_event_bus;
    use crate::models::user::DbUser;
    use crate::utils::hash_password;

    #[derive(Default)]
    struct Record {
        current: Option<(String, i64)>,
        spent: HashSet<String>,
    }

    struct MemoryStore {
        user: DbUser,
        tokens: Mutex<HashMap<Uuid, Record>>,
    }

    impl MemoryStore {
        fn new(password: &str) -> Self {
            let now = utc_now();
            Self {
                user: DbUser {
                    id: Uuid::new_v4(),
                    name: "Marina".to_string(),
                    email: "marina@globoo.com.br".to_string(),
                    password_hash: hash_password(password).unwrap(),
                    role: Role::Admin,
                    created_at: now,
                    updated_at: now,
                    deleted_at: None,
                },
                tokens: Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryStore {
        async fn find_user_by_email(&self, email: &str) -> AppResult<Option<DbUser>> {
            Ok((email == self.user.email).then(|| self.user.clone()))
        }

        async fn verify_password_hash(&self, password: &str, password_hash: &str) -> AppResult<bool> {
            crate::utils::verify_password(password, password_hash)
        }

        async fn get_role(&self, user_id: Uuid) -> AppResult<Option<Role>> {
            Ok((user_id == self.user.id).then_some(self.user.role))
        }
    }

    #[async_trait]
    impl RefreshTokenStore for MemoryStore {
        async fn store_refresh_token(&self, user_id: Uuid, token_hash: &str, expires_at: i64) -> AppResult<()> {
            let mut tokens = self.tokens.lock().unwrap();
            tokens.entry(user_id).or_default().current = Some((token_hash.to_string(), expires_at));
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
            let mut tokens = self.tokens.lock().unwrap();
            let record = tokens.entry(user_id).or_default();
            let is_current = matches!(&record.current, Some((hash, exp)) if hash == old_hash && *exp > now);

            if is_current {
                record.current = Some((new_hash.to_string(), new_expires_at));
                record.spent.insert(old_hash.to_string());
                Ok(RotateOutcome::Rotated)
            } else if record.spent.contains(old_hash) {
                record.current = None;
                Ok(RotateOutcome::Reused)
            } else {
                Ok(RotateOutcome::Rejected)
            }
        }

        async fn revoke_refresh_token(&self, user_id: Uuid, token_hash: &str) -> AppResult<bool> {
            let mut tokens = self.tokens.lock().unwrap();
            let record = tokens.entry(user_id).or_default();
            let is_current = matches!(&record.current, Some((hash, _)) if hash == token_hash);
            if is_current {
                record.current = None;
                Ok(true)
            } else {
                Ok(false)
            }
        }

        async fn revoke_all_for_user(&self, user_id: Uuid) -> AppResult<()> {
            if let Some(record) = self.tokens.lock().unwrap().get_mut(&user_id) {
                record.current = None;
            }
            Ok(())
        }
    }

    fn issuer(store: Arc<MemoryStore>, ttl: i64) -> TokenIssuer {
        let (bus, _rx) = init_event_bus();
        TokenIssuer::new(store.clone(), store, Arc::new(JwtConfig::new("unit-secret", 24)), ttl, bus)
    }

    #[tokio::test]
    async fn login_returns_projection_without_hash() {
        let store = Arc::new(MemoryStore::new("password123"));
        let issuer = issuer(store.clone(), 3600);

        let response = issuer.login("marina@globoo.com.br", "password123").await.unwrap();

        assert_eq!(response.user.id, store.user.id);
        assert_eq!(response.user.role, Role::Admin);
        assert_eq!(response.token_type, "Bearer");
        let json = serde_json::to_value(&response).unwrap();
        assert!(json["user"].get("password_hash").is_none());
    }

    #[tokio::test]
    async fn bad_password_and_unknown_email_look_the_same() {
        let store = Arc::new(MemoryStore::new("password123"));
        let issuer = issuer(store, 3600);

        let wrong = issuer.login("marina@globoo.com.br", "nope-nope").await.unwrap_err();
        let unknown = issuer.login("ghost@globoo.com.br", "password123").await.unwrap_err();

        assert!(matches!(wrong, AppError::InvalidCredentials));
        assert!(matches!(unknown, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn refresh_is_single_use() {
        let store = Arc::new(MemoryStore::new("password123"));
        let issuer = issuer(store, 3600);
        let session = issuer.login("marina@globoo.com.br", "password123").await.unwrap();

        let rotated = issuer.refresh(&session.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, session.refresh_token);

        let replay = issuer.refresh(&session.refresh_token).await.unwrap_err();
        assert!(matches!(replay, AppError::InvalidToken(_)));

        // Replay revoked the whole session, including the freshly rotated token.
        assert!(issuer.refresh(&rotated.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn replaying_an_older_generation_revokes_the_session() {
        let store = Arc::new(MemoryStore::new("password123"));
        let issuer = issuer(store, 3600);
        let t0 = issuer.login("marina@globoo.com.br", "password123").await.unwrap().refresh_token;
        let t1 = issuer.refresh(&t0).await.unwrap().refresh_token;
        let t2 = issuer.refresh(&t1).await.unwrap().refresh_token;

        assert!(matches!(issuer.refresh(&t0).await, Err(AppError::InvalidToken(_))));
        assert!(issuer.refresh(&t2).await.is_err());
    }

    #[tokio::test]
    async fn login_ignores_email_case() {
        let store = Arc::new(MemoryStore::new("password123"));
        let issuer = issuer(store.clone(), 3600);

        let response = issuer.login("  Marina@Globoo.com.BR", "password123").await.unwrap();
        assert_eq!(response.user.id, store.user.id);
    }

    #[tokio::test]
    async fn expired_refresh_token_is_rejected() {
        let store = Arc::new(MemoryStore::new("password123"));
        let issuer = issuer(store, -1);
        let session = issuer.login("marina@globoo.com.br", "password123").await.unwrap();

        assert!(matches!(issuer.refresh(&session.refresh_token).await, Err(AppError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn malformed_refresh_token_is_rejected() {
        let store = Arc::new(MemoryStore::new("password123"));
        let issuer = issuer(store, 3600);

        assert!(matches!(issuer.refresh("garbage").await, Err(AppError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let store = Arc::new(MemoryStore::new("password123"));
        let issuer = issuer(store, 3600);
        let session = issuer.login("marina@globoo.com.br", "password123").await.unwrap();

        issuer.logout(&session.refresh_token).await.unwrap();
        issuer.logout(&session.refresh_token).await.unwrap();
        issuer.logout("not-even-a-token").await.unwrap();

        assert!(issuer.refresh(&session.refresh_token).await.is_err());
    }
}
