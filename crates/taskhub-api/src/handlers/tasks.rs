//! Task handlers

use crate::auth::AuthenticatedUser;
use crate::error::{ApiJson, AppError};
use crate::projects::{Task, TaskQuery, UpdateTaskRequest};
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension,
};
use std::sync::Arc;
use uuid::Uuid;

/// Tasks assigned to the caller
#[utoipa::path(
    get,
    path = "/api/v1/tasks/mine",
    tag = "tasks",
    params(TaskQuery),
    responses(
        (status = 200, description = "Assigned tasks", body = [Task]),
        (status = 401, description = "Authentication failed", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn my_tasks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<TaskQuery>,
) -> Result<impl IntoResponse, AppError> {
    let tasks = state.tasks.my_tasks(&user.principal, query).await?;

    Ok(ApiResponse::ok(tasks))
}

#[utoipa::path(
    get,
    path = "/api/v1/tasks/{id}",
    tag = "tasks",
    params(("id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task", body = Task),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let task = state.tasks.get(&user.principal, id).await?;

    Ok(ApiResponse::ok(task))
}

#[utoipa::path(
    put,
    path = "/api/v1/tasks/{id}",
    tag = "tasks",
    params(("id" = Uuid, Path, description = "Task ID")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Updated task", body = Task),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<UpdateTaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    let task = state.tasks.update(&user.principal, id, request).await?;

    Ok(ApiResponse::with_message(task, "Task updated"))
}

#[utoipa::path(
    delete,
    path = "/api/v1/tasks/{id}",
    tag = "tasks",
    params(("id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task deleted"),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.tasks.delete(&user.principal, id).await?;

    Ok(ApiResponse::message("Task deleted"))
}
