//! Activity log handler

use crate::activity::{ActivityEntry, ActivityFilter, EntityType};
use crate::error::AppError;
use crate::projects::models::page;
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use taskhub_core::TaskhubError;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ActivityQuery {
    /// Acting user
    pub user_id: Option<Uuid>,
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Activity log, newest first
///
/// Route is gated on `activity_read`.
#[utoipa::path(
    get,
    path = "/api/v1/activity",
    tag = "activity",
    params(ActivityQuery),
    responses(
        (status = 200, description = "Activity entries", body = [ActivityEntry]),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_activity(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ActivityQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (limit, offset) = page(query.limit, query.offset);
    let filter = ActivityFilter {
        user_id: query.user_id,
        entity_type: query.entity_type,
        entity_id: query.entity_id,
    };

    let entries = state
        .activity
        .list(&filter, limit, offset)
        .await
        .map_err(TaskhubError::from)?;

    Ok(ApiResponse::ok(entries))
}
