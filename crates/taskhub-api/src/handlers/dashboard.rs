//! Dashboard handlers

use crate::activity::ActivityEntry;
use crate::auth::AuthenticatedUser;
use crate::dashboard::DashboardSummary;
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Extension,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct RecentActivityQuery {
    /// Number of entries, 1 to 100 (default 20)
    pub limit: Option<i64>,
}

/// Status counts scoped to the caller
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/summary",
    tag = "dashboard",
    responses(
        (status = 200, description = "Summary", body = DashboardSummary),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn summary(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, AppError> {
    let summary = state.dashboard.summary(&user.principal).await?;

    Ok(ApiResponse::ok(summary))
}

/// Latest activity visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/activity",
    tag = "dashboard",
    params(RecentActivityQuery),
    responses(
        (status = 200, description = "Recent activity, newest first", body = [ActivityEntry]),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn recent_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<RecentActivityQuery>,
) -> Result<impl IntoResponse, AppError> {
    let entries = state
        .dashboard
        .recent_activity(&user.principal, query.limit.unwrap_or(20))
        .await?;

    Ok(ApiResponse::ok(entries))
}
