//! Client-side session handling.
//!
//! [`SessionClient`] talks to the auth service through one configured base
//! URL, keeps the tokens in an explicit [`SessionStore`], attaches the bearer
//! token to every call and transparently performs one refresh-and-replay when
//! a call comes back `401`.

mod error;
mod navigator;
mod session;

pub use error::ClientError;
pub use navigator::{Navigator, TracingNavigator};
pub use session::{Session, SessionStore};

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::authz::PermissionTable;
use crate::models::user::{AuthResponse, LoginRequest, TokenPair};
use crate::routes::auth::REFRESH_COOKIE;

/// Single source of truth for where the auth service lives.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub login_path: String,
    pub refresh_path: String,
    pub logout_path: String,
    pub login_page: String,
    pub landing_page: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(10),
            login_path: "/api/auth/login".to_string(),
            refresh_path: "/api/auth/refresh".to_string(),
            logout_path: "/api/auth/logout".to_string(),
            login_page: "/auth/login".to_string(),
            landing_page: "/dashboard".to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub struct SessionClient {
    http: reqwest::Client,
    config: ClientConfig,
    store: SessionStore,
    permissions: Arc<PermissionTable>,
    navigator: Arc<dyn Navigator>,
    refresh_lock: Mutex<()>,
}

impl SessionClient {
    pub fn new(
        config: ClientConfig,
        store: SessionStore,
        permissions: Arc<PermissionTable>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ClientError::from_transport)?;

        Ok(Self {
            http,
            config,
            store,
            permissions,
            navigator,
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Never fails loudly: `false` tells the caller to render an error.
    pub async fn login(&self, credentials: &LoginRequest, callback_url: Option<&str>) -> bool {
        match self.request_login(credentials).await {
            Ok(response) => {
                tracing::info!(user_id = %response.user.id, role = %response.user.role, "signed in");
                self.store.set(Session::from(response));
                let target = callback_url
                    .filter(|url| crate::routes::pages::is_local_path(url))
                    .unwrap_or(&self.config.landing_page);
                self.navigator.navigate(target);
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "sign in failed");
                false
            }
        }
    }

    /// Always leaves the client signed out, whatever the auth service says.
    pub async fn logout(&self) {
        if let Some(session) = self.store.take() {
            let result = self
                .http
                .post(self.config.url(&self.config.logout_path))
                .header(header::COOKIE, format!("{REFRESH_COOKIE}={}", session.refresh_token))
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => {
                    tracing::warn!(status = %response.status(), "remote logout rejected, local session cleared anyway")
                }
                Err(err) => tracing::warn!(error = %err, "remote logout failed, local session cleared anyway"),
            }
        }

        self.navigator.navigate(&self.config.login_page);
    }

    /// UI visibility helper. The session gate stays authoritative.
    pub fn has_permission(&self, route_prefix: &str) -> bool {
        self.store
            .role()
            .map(|role| self.permissions.has_permission(role, route_prefix))
            .unwrap_or(false)
    }

    /// Send an authenticated request to `path` on the configured base URL.
    ///
    /// A `401` triggers at most one refresh followed by one replay. If the
    /// refresh is refused the session is cleared and the user sent to login.
    pub async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<reqwest::Response, ClientError> {
        let token = self.store.access_token().ok_or(ClientError::NotAuthenticated)?;

        let response = self.dispatch(method.clone(), path, body, &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::debug!(path = %path, "access token rejected, attempting refresh");
        let fresh = match self.refresh_after(&token).await {
            Ok(fresh) => fresh,
            Err(err) => {
                if err.is_auth_failure() {
                    self.store.clear();
                    self.navigator.navigate(&self.config.login_page);
                }
                return Err(err);
            }
        };

        self.dispatch(method, path, body, &fresh).await
    }

    /// [`send`](Self::send) plus status mapping and JSON decoding.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ClientError> {
        let response = self.send(method, path, body).await?;

        match response.status() {
            status if status.is_success() => response.json().await.map_err(ClientError::from_transport),
            StatusCode::UNAUTHORIZED => Err(ClientError::InvalidToken),
            StatusCode::FORBIDDEN => Err(ClientError::Unauthorized),
            status => Err(unexpected(status, response).await),
        }
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: &str,
    ) -> Result<reqwest::Response, ClientError> {
        let mut request = self.http.request(method, self.config.url(path)).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(ClientError::from_transport)
    }

    /// Returns a usable access token, refreshing only if `stale` is still
    /// the current one. Concurrent callers share a single refresh.
    async fn refresh_after(&self, stale: &str) -> Result<String, ClientError> {
        let _guard = self.refresh_lock.lock().await;

        let session = self.store.get().ok_or(ClientError::NotAuthenticated)?;
        if session.access_token != stale {
            return Ok(session.access_token);
        }

        let response = self
            .http
            .post(self.config.url(&self.config.refresh_path))
            .header(header::COOKIE, format!("{REFRESH_COOKIE}={}", session.refresh_token))
            .send()
            .await
            .map_err(ClientError::from_transport)?;

        match response.status() {
            status if status.is_success() => {
                let pair: TokenPair = response.json().await.map_err(ClientError::from_transport)?;
                if !self.store.apply_rotation(&pair) {
                    return Err(ClientError::NotAuthenticated);
                }
                tracing::debug!("access token refreshed");
                Ok(pair.access_token)
            }
            StatusCode::UNAUTHORIZED => {
                tracing::info!("refresh refused, session ended");
                Err(ClientError::InvalidToken)
            }
            status => Err(unexpected(status, response).await),
        }
    }

    async fn request_login(&self, credentials: &LoginRequest) -> Result<AuthResponse, ClientError> {
        let response = self
            .http
            .post(self.config.url(&self.config.login_path))
            .json(credentials)
            .send()
            .await
            .map_err(ClientError::from_transport)?;

        match response.status() {
            status if status.is_success() => response.json().await.map_err(ClientError::from_transport),
            StatusCode::UNAUTHORIZED => Err(ClientError::InvalidCredentials),
            status => Err(unexpected(status, response).await),
        }
    }
}

async fn unexpected(status: StatusCode, response: reqwest::Response) -> ClientError {
    let body = response.text().await.unwrap_or_default();
    ClientError::Status {
        status: status.as_u16(),
        body,
    }
}
