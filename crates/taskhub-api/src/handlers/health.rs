//! Liveness and readiness probes

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Serialize, ToSchema)]
pub struct ReadinessChecks {
    /// True when no pool is configured
    pub database: bool,
}

#[derive(Serialize, ToSchema)]
pub struct ReadinessResponse {
    /// False once shutdown has begun or a dependency is down
    pub ready: bool,
    pub checks: ReadinessChecks,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Process is up", body = HealthResponse))
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_seconds: state.uptime_secs(),
    })
}

#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Accepting traffic", body = ReadinessResponse),
        (status = 503, description = "Not accepting traffic", body = ReadinessResponse)
    )
)]
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let checks = ReadinessChecks {
        database: state.check_database().await,
    };
    let ready = state.is_ready() && checks.database;

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(ReadinessResponse { ready, checks }))
}
