//! TaskHub API - REST server for projects, tasks and their users
//!
//! The core is the session lifecycle in [`auth`]: registration, login,
//! access token verification, refresh token rotation, blacklisting and
//! per-request permission resolution. Projects, tasks, the dashboard and the
//! activity log sit on top of it.

pub mod activity;
pub mod audit;
pub mod auth;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod handlers;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod middleware;
pub mod projects;
pub mod response;
pub mod routes;
pub mod state;

use crate::handlers::health::{health_check, readiness_check};
use crate::state::AppState;
use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI document served at `/api-docs/openapi.json`
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::health::readiness_check,
        handlers::auth::register_handler,
        handlers::auth::login_handler,
        handlers::auth::verify_handler,
        handlers::auth::refresh_handler,
        handlers::auth::change_password_handler,
        handlers::auth::logout_handler,
        handlers::auth::logout_all_handler,
        handlers::auth::me_handler,
        handlers::users::list_users,
        handlers::users::get_user,
        handlers::users::update_user,
        handlers::users::update_status,
        handlers::users::list_roles,
        handlers::users::assign_role,
        handlers::users::revoke_role,
        handlers::projects::list_projects,
        handlers::projects::create_project,
        handlers::projects::get_project,
        handlers::projects::update_project,
        handlers::projects::delete_project,
        handlers::projects::list_project_tasks,
        handlers::projects::create_task,
        handlers::tasks::my_tasks,
        handlers::tasks::get_task,
        handlers::tasks::update_task,
        handlers::tasks::delete_task,
        handlers::dashboard::summary,
        handlers::dashboard::recent_activity,
        handlers::activity::list_activity,
    ),
    components(schemas(
        error::ApiError,
        handlers::health::HealthResponse,
        handlers::health::ReadinessResponse,
        handlers::health::ReadinessChecks,
        handlers::auth::VerifyResponse,
        handlers::auth::LogoutAllResponse,
        auth::RegisterRequest,
        auth::LoginRequest,
        auth::RefreshRequest,
        auth::LogoutRequest,
        auth::ChangePasswordRequest,
        auth::AuthResponse,
        auth::UserProfile,
        auth::UserPublic,
        auth::RoleAssignment,
        auth::admin::UpdateUserRequest,
        auth::admin::UpdateStatusRequest,
        auth::admin::AssignRoleRequest,
        projects::Project,
        projects::Task,
        projects::CreateProjectRequest,
        projects::UpdateProjectRequest,
        projects::CreateTaskRequest,
        projects::UpdateTaskRequest,
        dashboard::DashboardSummary,
        dashboard::StatusBreakdown,
        activity::ActivityEntry,
        activity::ActivityAction,
        activity::EntityType,
        taskhub_core::Role,
        taskhub_core::Capability,
        taskhub_core::WorkStatus,
        taskhub_core::TaskPriority,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness and readiness"),
        (name = "auth", description = "Registration, login and sessions"),
        (name = "users", description = "User administration"),
        (name = "projects", description = "Projects"),
        (name = "tasks", description = "Tasks"),
        (name = "dashboard", description = "Aggregates"),
        (name = "activity", description = "Activity log"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Routes, Swagger UI and security headers
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .with_state(state)
}

/// [`create_router`] plus request tracing, timeout and CORS from configuration
pub fn create_app(state: Arc<AppState>) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    let cors = middleware::cors_layer(&state.config.server.cors_origins);

    create_router(state)
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Router over fresh in-memory repositories
#[cfg(any(test, feature = "test-utils"))]
pub fn create_router_for_testing() -> Router {
    create_router_for_testing_with(db::Repositories::in_memory())
}

/// Router over the given repositories, with test-speed password hashing
#[cfg(any(test, feature = "test-utils"))]
pub fn create_router_for_testing_with(repos: db::Repositories) -> Router {
    let state = AppState::for_testing_with(repos).expect("test state");
    create_router(Arc::new(state))
}
