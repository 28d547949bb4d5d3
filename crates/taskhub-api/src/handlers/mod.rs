//! API handlers

pub mod activity;
pub mod auth;
pub mod dashboard;
pub mod health;
pub mod projects;
pub mod tasks;
pub mod users;

use serde::Deserialize;
use utoipa::IntoParams;

/// Plain limit/offset pagination
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct PageQuery {
    /// Page size, 1 to 100 (default 50)
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
