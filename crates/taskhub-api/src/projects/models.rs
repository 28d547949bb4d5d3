//! Project and task models

use crate::db::RepositoryError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use taskhub_core::{TaskPriority, WorkStatus};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

pub const MAX_NAME_LEN: u64 = 200;

/// Project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: WorkStatus,
    pub created_by: Uuid,
    pub responsible_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Creator or responsible user
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.created_by == user_id || self.responsible_id == Some(user_id)
    }
}

/// Task belonging to a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: WorkStatus,
    pub priority: TaskPriority,
    pub assigned_to: Option<Uuid>,
    pub created_by: Uuid,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Past its due date and still open
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status.is_open() && self.due_date.is_some_and(|due| due < today)
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct ProjectRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    status: String,
    created_by: Uuid,
    responsible_id: Option<Uuid>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = RepositoryError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        Ok(Project {
            id: row.id,
            name: row.name,
            description: row.description,
            status: row.status.parse()?,
            created_by: row.created_by,
            responsible_id: row.responsible_id,
            start_date: row.start_date,
            end_date: row.end_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct TaskRow {
    id: Uuid,
    project_id: Uuid,
    title: String,
    description: Option<String>,
    status: String,
    priority: String,
    assigned_to: Option<Uuid>,
    created_by: Uuid,
    due_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = RepositoryError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Task {
            id: row.id,
            project_id: row.project_id,
            title: row.title,
            description: row.description,
            status: row.status.parse()?,
            priority: row.priority.parse()?,
            assigned_to: row.assigned_to,
            created_by: row.created_by,
            due_date: row.due_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Project creation request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1 to 200 characters"))]
    pub name: String,
    pub description: Option<String>,
    pub status: Option<WorkStatus>,
    pub responsible_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Partial project update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1 to 200 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<WorkStatus>,
    pub responsible_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Task creation request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: String,
    pub description: Option<String>,
    pub status: Option<WorkStatus>,
    pub priority: Option<TaskPriority>,
    pub assigned_to: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

/// Partial task update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<WorkStatus>,
    pub priority: Option<TaskPriority>,
    pub assigned_to: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

/// Project listing query
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ProjectQuery {
    pub status: Option<WorkStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Task listing query
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct TaskQuery {
    pub status: Option<WorkStatus>,
    pub assigned_to: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Repository-level project filter
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub status: Option<WorkStatus>,
    /// Only projects created by or assigned to this user
    pub member: Option<Uuid>,
}

impl ProjectFilter {
    pub fn matches(&self, project: &Project) -> bool {
        self.status.map_or(true, |s| project.status == s)
            && self.member.map_or(true, |user| project.is_owned_by(user))
    }
}

/// Repository-level task filter
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub project_id: Option<Uuid>,
    pub status: Option<WorkStatus>,
    pub assigned_to: Option<Uuid>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.project_id.map_or(true, |id| task.project_id == id)
            && self.status.map_or(true, |s| task.status == s)
            && self.assigned_to.map_or(true, |user| task.assigned_to == Some(user))
    }
}

/// Which tasks an aggregate counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskScope {
    All,
    /// Tasks in projects the user owns, plus tasks assigned to the user
    VisibleTo(Uuid),
    AssignedTo(Uuid),
}

/// Row count for one status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatusCount {
    pub status: WorkStatus,
    pub count: i64,
}

/// Clamp client pagination to sane bounds
pub fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (limit.unwrap_or(50).clamp(1, 100), offset.unwrap_or(0).max(0))
}
