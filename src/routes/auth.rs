use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::authz::Role;
use crate::errors::{AppError, AppResult};
use crate::events::{self, names};
use crate::jwt::AuthUser;
use crate::models::user::{AuthResponse, LoginRequest, RefreshRequest, RegisterRequest, TokenPair, User};
use crate::utils::{hash_password, normalize_email};

pub const REFRESH_COOKIE: &str = "refresh_token";
const REFRESH_COOKIE_PATH: &str = "/api/auth";

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    message: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = User),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    let name = payload.name.trim();
    let email = normalize_email(&payload.email);
    if name.is_empty() || email.is_empty() {
        return Err(AppError::bad_request("name and email are required"));
    }

    let password_hash = hash_password(&payload.password)?;
    let db_user = state.store.create_user(name, &email, &password_hash, Role::Assistant).await?;

    events::publish(
        &state.event_bus,
        names::USER_REGISTERED,
        None,
        Some(db_user.id),
        json!({ "role": db_user.role }),
    );

    Ok((StatusCode::CREATED, Json(User::from(db_user))))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(State(state): State<AppState>, Json(payload): Json<LoginRequest>) -> AppResult<Response> {
    let session = state.issuer.login(&payload.email, &payload.password).await?;
    let cookie = refresh_cookie(&session.refresh_token, state.issuer.refresh_ttl_seconds(), state.config.cookie_secure);

    Ok(([(header::SET_COOKIE, cookie)], Json(session)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Auth",
    request_body(content = RefreshRequest, description = "Only needed when the refresh cookie is absent"),
    responses(
        (status = 200, description = "Tokens rotated", body = TokenPair),
        (status = 401, description = "Refresh token expired, unknown or reused")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> AppResult<Response> {
    let token = presented_refresh_token(&headers, body.map(|Json(b)| b))
        .ok_or_else(|| AppError::invalid_token("refresh token missing"))?;

    match state.issuer.refresh(&token).await {
        Ok(pair) => {
            let cookie = refresh_cookie(&pair.refresh_token, state.issuer.refresh_ttl_seconds(), state.config.cookie_secure);
            Ok(([(header::SET_COOKIE, cookie)], Json(pair)).into_response())
        }
        Err(err @ AppError::InvalidToken(_)) => {
            // Drop the dead cookie so the browser stops presenting it.
            let mut response = err.into_response();
            if let Ok(value) = clear_refresh_cookie(state.config.cookie_secure).parse() {
                response.headers_mut().insert(header::SET_COOKIE, value);
            }
            Ok(response)
        }
        Err(err) => Err(err),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Logout acknowledged", body = MessageResponse))
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> AppResult<Response> {
    if let Some(token) = presented_refresh_token(&headers, body.map(|Json(b)| b)) {
        state.issuer.logout(&token).await?;
    }

    let message = MessageResponse {
        message: "Logged out".to_string(),
    };
    Ok(([(header::SET_COOKIE, clear_refresh_cookie(state.config.cookie_secure))], Json(message)).into_response())
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current user", body = User)),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<User>> {
    let db_user = state
        .store
        .find_user_by_id(auth.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;
    Ok(Json(User::from(db_user)))
}

fn presented_refresh_token(headers: &HeaderMap, body: Option<RefreshRequest>) -> Option<String> {
    read_cookie(headers, REFRESH_COOKIE)
        .or_else(|| body.and_then(|b| b.refresh_token))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Extract a named cookie value from request headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

pub fn refresh_cookie(value: &str, max_age: i64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!("{REFRESH_COOKIE}={value}; HttpOnly{secure}; SameSite=Strict; Path={REFRESH_COOKIE_PATH}; Max-Age={max_age}")
}

pub fn clear_refresh_cookie(secure: bool) -> String {
    refresh_cookie("", 0, secure)
}
