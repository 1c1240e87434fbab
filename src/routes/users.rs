//! Administrative user management: role changes and account deletion.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Role;
use crate::errors::{AppError, AppResult};
use crate::events::{self, names};
use crate::jwt::AuthUser;
use crate::models::user::{RoleUpdateRequest, User};

#[utoipa::path(
    put,
    path = "/api/users/{id}/role",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = RoleUpdateRequest,
    responses(
        (status = 200, description = "Role updated", body = User),
        (status = 403, description = "Caller may not assign this role"),
        (status = 404, description = "User not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<RoleUpdateRequest>,
) -> AppResult<Json<User>> {
    if !auth.role.is_administrative() {
        return Err(AppError::unauthorized(format!("role '{}' may not change roles", auth.role)));
    }

    let target = state
        .store
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    // Only a CEO may grant or take away the CEO role.
    if (target.role == Role::Ceo || payload.role == Role::Ceo) && auth.role != Role::Ceo {
        return Err(AppError::unauthorized("only a CEO may change CEO assignments"));
    }

    if target.role == payload.role {
        return Ok(Json(User::from(target)));
    }

    let updated = state.store.update_role(user_id, payload.role).await?;

    tracing::info!(
        actor_id = %auth.user_id,
        user_id = %user_id,
        from = %target.role,
        to = %updated.role,
        "role changed"
    );
    events::publish(
        &state.event_bus,
        names::ROLE_CHANGED,
        Some(auth.user_id),
        Some(user_id),
        json!({ "from": target.role, "to": updated.role }),
    );

    Ok(Json(User::from(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 403, description = "Only a CEO may delete accounts"),
        (status = 404, description = "User not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    auth.require_any(&[Role::Ceo])?;

    if auth.user_id == user_id {
        return Err(AppError::bad_request("an account cannot delete itself"));
    }

    state.store.soft_delete_user(user_id).await?;

    tracing::info!(actor_id = %auth.user_id, user_id = %user_id, "account deleted");
    events::publish(&state.event_bus, names::USER_DELETED, Some(auth.user_id), Some(user_id), json!({}));

    Ok(StatusCode::NO_CONTENT)
}
