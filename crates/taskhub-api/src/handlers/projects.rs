//! Project handlers

use crate::auth::AuthenticatedUser;
use crate::error::{ApiJson, AppError};
use crate::projects::{
    CreateProjectRequest, CreateTaskRequest, Project, ProjectQuery, Task, TaskQuery,
    UpdateProjectRequest,
};
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension,
};
use std::sync::Arc;
use uuid::Uuid;

/// List projects
///
/// Readers see every project; everyone else sees the projects they created
/// or are responsible for.
#[utoipa::path(
    get,
    path = "/api/v1/projects",
    tag = "projects",
    params(ProjectQuery),
    responses(
        (status = 200, description = "Projects, newest first", body = [Project]),
        (status = 401, description = "Authentication failed", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<ProjectQuery>,
) -> Result<impl IntoResponse, AppError> {
    let projects = state.projects.list(&user.principal, query).await?;

    Ok(ApiResponse::ok(projects))
}

#[utoipa::path(
    post,
    path = "/api/v1/projects",
    tag = "projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(request): ApiJson<CreateProjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    let project = state.projects.create(&user.principal, request).await?;

    Ok(ApiResponse::with_message(project, "Project created").created())
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}",
    tag = "projects",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project", body = Project),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let project = state.projects.get(&user.principal, id).await?;

    Ok(ApiResponse::ok(project))
}

#[utoipa::path(
    put,
    path = "/api/v1/projects/{id}",
    tag = "projects",
    params(("id" = Uuid, Path, description = "Project ID")),
    request_body = UpdateProjectRequest,
    responses(
        (status = 200, description = "Updated project", body = Project),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_project(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<UpdateProjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    let project = state.projects.update(&user.principal, id, request).await?;

    Ok(ApiResponse::with_message(project, "Project updated"))
}

/// Delete a project and its tasks
#[utoipa::path(
    delete,
    path = "/api/v1/projects/{id}",
    tag = "projects",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project deleted"),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.projects.delete(&user.principal, id).await?;

    Ok(ApiResponse::message("Project deleted"))
}

/// Tasks of one project, highest priority first
#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}/tasks",
    tag = "tasks",
    params(("id" = Uuid, Path, description = "Project ID"), TaskQuery),
    responses(
        (status = 200, description = "Tasks", body = [Task]),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "Project not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_project_tasks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Query(query): Query<TaskQuery>,
) -> Result<impl IntoResponse, AppError> {
    let tasks = state
        .tasks
        .list_for_project(&user.principal, id, query)
        .await?;

    Ok(ApiResponse::ok(tasks))
}

#[utoipa::path(
    post,
    path = "/api/v1/projects/{id}/tasks",
    tag = "tasks",
    params(("id" = Uuid, Path, description = "Project ID")),
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "Project not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<CreateTaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    let task = state.tasks.create(&user.principal, id, request).await?;

    Ok(ApiResponse::with_message(task, "Task created").created())
}
