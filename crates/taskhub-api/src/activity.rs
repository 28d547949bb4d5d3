//! Activity log
//!
//! Every successful mutation of a project, task or user writes one entry.
//! Recording is best effort: a failed insert is logged and the mutation
//! that triggered it still succeeds.

use crate::auth::permissions::Principal;
use crate::db::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::str::FromStr;
use std::sync::Arc;
use taskhub_core::{Capability, TaskhubError};
use utoipa::ToSchema;
use uuid::Uuid;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Created,
    Updated,
    Deleted,
    StatusChanged,
    Assigned,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Created => "created",
            ActivityAction::Updated => "updated",
            ActivityAction::Deleted => "deleted",
            ActivityAction::StatusChanged => "status_changed",
            ActivityAction::Assigned => "assigned",
        }
    }
}

impl FromStr for ActivityAction {
    type Err = TaskhubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(ActivityAction::Created),
            "updated" => Ok(ActivityAction::Updated),
            "deleted" => Ok(ActivityAction::Deleted),
            "status_changed" => Ok(ActivityAction::StatusChanged),
            "assigned" => Ok(ActivityAction::Assigned),
            other => Err(TaskhubError::ValidationError(format!("Unknown action: {other}"))),
        }
    }
}

/// Kind of entity an entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Project,
    Task,
    User,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Project => "project",
            EntityType::Task => "task",
            EntityType::User => "user",
        }
    }
}

impl FromStr for EntityType {
    type Err = TaskhubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" => Ok(EntityType::Project),
            "task" => Ok(EntityType::Task),
            "user" => Ok(EntityType::User),
            other => Err(TaskhubError::ValidationError(format!("Unknown entity type: {other}"))),
        }
    }
}

/// Activity log entry
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: ActivityAction,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Values for a new entry
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub user_id: Option<Uuid>,
    pub action: ActivityAction,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub details: serde_json::Value,
}

/// Listing filter; `None` fields match everything
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ActivityFilter {
    pub user_id: Option<Uuid>,
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<Uuid>,
}

impl ActivityFilter {
    pub fn matches(&self, entry: &ActivityEntry) -> bool {
        self.user_id.map_or(true, |id| entry.user_id == Some(id))
            && self.entity_type.map_or(true, |t| entry.entity_type == t)
            && self.entity_id.map_or(true, |id| entry.entity_id == id)
    }
}

/// Activity log store
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn append(&self, entry: NewActivity) -> Result<ActivityEntry, RepositoryError>;

    /// Newest first
    async fn list_activity(
        &self,
        filter: &ActivityFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ActivityEntry>, RepositoryError>;
}

#[derive(Debug, FromRow)]
struct ActivityRow {
    id: Uuid,
    user_id: Option<Uuid>,
    action: String,
    entity_type: String,
    entity_id: Uuid,
    details: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<ActivityRow> for ActivityEntry {
    type Error = RepositoryError;

    fn try_from(row: ActivityRow) -> Result<Self, Self::Error> {
        Ok(ActivityEntry {
            id: row.id,
            user_id: row.user_id,
            action: row.action.parse()?,
            entity_type: row.entity_type.parse()?,
            entity_id: row.entity_id,
            details: row.details,
            created_at: row.created_at,
        })
    }
}

/// PostgreSQL activity log
pub struct PgActivityRepository {
    pool: PgPool,
}

impl PgActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityRepository for PgActivityRepository {
    async fn append(&self, entry: NewActivity) -> Result<ActivityEntry, RepositoryError> {
        let row = sqlx::query_as::<_, ActivityRow>(
            "INSERT INTO activity_log (id, user_id, action, entity_type, entity_id, details, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW()) \
             RETURNING id, user_id, action, entity_type, entity_id, details, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(entry.user_id)
        .bind(entry.action.as_str())
        .bind(entry.entity_type.as_str())
        .bind(entry.entity_id)
        .bind(&entry.details)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn list_activity(
        &self,
        filter: &ActivityFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ActivityEntry>, RepositoryError> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, user_id, action, entity_type, entity_id, details, created_at FROM activity_log WHERE TRUE",
        );

        if let Some(user_id) = filter.user_id {
            query.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(entity_type) = filter.entity_type {
            query.push(" AND entity_type = ").push_bind(entity_type.as_str());
        }
        if let Some(entity_id) = filter.entity_id {
            query.push(" AND entity_id = ").push_bind(entity_id);
        }

        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = query
            .build_query_as::<ActivityRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(ActivityEntry::try_from).collect()
    }
}

/// Records and lists activity
#[derive(Clone)]
pub struct ActivityLogger {
    repository: Arc<dyn ActivityRepository>,
}

impl ActivityLogger {
    pub fn new(repository: Arc<dyn ActivityRepository>) -> Self {
        Self { repository }
    }

    /// Persist an entry; failures are logged, never returned
    pub async fn record(
        &self,
        user_id: Option<Uuid>,
        action: ActivityAction,
        entity_type: EntityType,
        entity_id: Uuid,
        details: serde_json::Value,
    ) {
        let entry = NewActivity {
            user_id,
            action,
            entity_type,
            entity_id,
            details,
        };

        if let Err(e) = self.repository.append(entry).await {
            tracing::warn!(
                error = %e,
                action = action.as_str(),
                entity_type = entity_type.as_str(),
                %entity_id,
                "Failed to record activity"
            );
        }
    }

    pub async fn list(
        &self,
        filter: &ActivityFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ActivityEntry>, RepositoryError> {
        self.repository.list_activity(filter, limit, offset).await
    }

    /// Latest entries visible to the principal
    ///
    /// Administrators and holders of `ActivityRead` see everything; everyone
    /// else sees only their own actions.
    pub async fn recent_for(
        &self,
        principal: &Principal,
        limit: i64,
    ) -> Result<Vec<ActivityEntry>, RepositoryError> {
        let filter = if principal.has_capability(Capability::ActivityRead) {
            ActivityFilter::default()
        } else {
            ActivityFilter {
                user_id: Some(principal.user_id),
                ..Default::default()
            }
        };

        self.list(&filter, limit, 0).await
    }
}
