//! API route definitions

use crate::auth::middleware::{auth_middleware, require_admin, require_capability};
use crate::handlers::{activity, auth, dashboard, projects, tasks, users};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use std::sync::Arc;
use taskhub_core::Capability;

/// Create API v1 routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/refresh-token", post(auth::refresh_handler));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/auth/verify", get(auth::verify_handler))
        .route("/auth/change-password", put(auth::change_password_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/logout-all", post(auth::logout_all_handler))
        .route("/auth/me", get(auth::me_handler))
        // Projects
        .route(
            "/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/projects/:id",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        .route(
            "/projects/:id/tasks",
            get(projects::list_project_tasks).post(projects::create_task),
        )
        // Tasks
        .route("/tasks/mine", get(tasks::my_tasks))
        .route(
            "/tasks/:id",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        // Dashboard and activity
        .route(
            "/dashboard/summary",
            get(dashboard::summary).route_layer(middleware::from_fn(require_capability(
                Capability::DashboardRead,
            ))),
        )
        .route(
            "/dashboard/activity",
            get(dashboard::recent_activity).route_layer(middleware::from_fn(
                require_capability(Capability::DashboardRead),
            )),
        )
        .route(
            "/activity",
            get(activity::list_activity).route_layer(middleware::from_fn(require_capability(
                Capability::ActivityRead,
            ))),
        )
        // Users; admin-only methods carry their own gate
        .route("/users", get(users::list_users))
        .route("/users/:id", get(users::get_user).put(users::update_user))
        .route(
            "/users/:id/status",
            patch(users::update_status).route_layer(middleware::from_fn(require_admin)),
        )
        .route(
            "/users/:id/roles",
            post(users::assign_role)
                .route_layer(middleware::from_fn(require_admin))
                .get(users::list_roles),
        )
        .route(
            "/users/:id/roles/:role",
            delete(users::revoke_role).route_layer(middleware::from_fn(require_admin)),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new().merge(public_routes).merge(protected_routes)
}
