//! User administration handlers

use super::PageQuery;
use crate::audit::{audit_log, AuditEvent, ClientInfo};
use crate::auth::admin::{AssignRoleRequest, UpdateStatusRequest, UpdateUserRequest};
use crate::auth::{AuthenticatedUser, RoleAssignment, UserPublic};
use crate::error::{ApiJson, AppError};
use crate::projects::models::page;
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension,
};
use std::sync::Arc;
use taskhub_core::Role;
use uuid::Uuid;

/// List users
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    params(PageQuery),
    responses(
        (status = 200, description = "Users, newest first", body = [UserPublic]),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (limit, offset) = page(query.limit, query.offset);
    let users = state.users.list_users(&user.principal, limit, offset).await?;

    Ok(ApiResponse::ok(users))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserPublic),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let found = state.users.get_user(&user.principal, id).await?;

    Ok(ApiResponse::ok(found))
}

/// Update name and phone
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = UserPublic),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let updated = state.users.update_profile(&user.principal, id, request).await?;

    Ok(ApiResponse::with_message(updated, "User updated"))
}

/// Activate or deactivate an account (administrators only)
#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}/status",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Updated user", body = UserPublic),
        (status = 400, description = "Cannot deactivate own account", body = crate::error::ApiError),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<UpdateStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let updated = state
        .users
        .set_status(&user.principal, id, request.is_active)
        .await?;

    audit_log(
        &AuditEvent::UserStatusChanged {
            user_id: id,
            is_active: updated.is_active,
            by: user.user_id(),
        },
        &client,
    );

    Ok(ApiResponse::ok(updated))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/roles",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Role assignments, including revoked ones", body = [RoleAssignment]),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_roles(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let assignments = state.users.list_roles(&user.principal, id).await?;

    Ok(ApiResponse::ok(assignments))
}

/// Assign a role (administrators only)
#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/roles",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = AssignRoleRequest,
    responses(
        (status = 201, description = "Role assigned", body = RoleAssignment),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn assign_role(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<AssignRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let assignment = state
        .users
        .assign_role(&user.principal, id, request.role)
        .await?;

    audit_log(
        &AuditEvent::RoleAssigned {
            user_id: id,
            role: request.role,
            by: user.user_id(),
        },
        &client,
    );

    Ok(ApiResponse::with_message(assignment, "Role assigned").created())
}

/// Revoke a role (administrators only)
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}/roles/{role}",
    tag = "users",
    params(
        ("id" = Uuid, Path, description = "User ID"),
        ("role" = Role, Path, description = "Role name"),
    ),
    responses(
        (status = 200, description = "Role revoked"),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "No active assignment", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn revoke_role(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    client: ClientInfo,
    Path((id, role)): Path<(Uuid, Role)>,
) -> Result<impl IntoResponse, AppError> {
    state.users.revoke_role(&user.principal, id, role).await?;

    audit_log(
        &AuditEvent::RoleRevoked {
            user_id: id,
            role,
            by: user.user_id(),
        },
        &client,
    );

    Ok(ApiResponse::message("Role revoked"))
}
