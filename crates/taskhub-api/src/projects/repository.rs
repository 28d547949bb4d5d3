//! Project and task repositories

use super::models::{
    Project, ProjectFilter, ProjectRow, StatusCount, Task, TaskFilter, TaskRow, TaskScope,
};
use crate::db::{is_foreign_key_violation, RepositoryError};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const PROJECT_COLUMNS: &str = "id, name, description, status, created_by, responsible_id, \
     start_date, end_date, created_at, updated_at";

const TASK_COLUMNS: &str = "id, project_id, title, description, status, priority, assigned_to, \
     created_by, due_date, created_at, updated_at";

/// Project store
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn insert_project(&self, project: &Project) -> Result<(), RepositoryError>;

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, RepositoryError>;

    /// Newest first
    async fn list_projects(
        &self,
        filter: &ProjectFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Project>, RepositoryError>;

    /// Overwrite every mutable column
    async fn update_project(&self, project: &Project) -> Result<(), RepositoryError>;

    /// Delete the project and its tasks; false if it did not exist
    async fn delete_project(&self, id: Uuid) -> Result<bool, RepositoryError>;

    /// Project counts per status, optionally restricted to one member
    async fn project_status_counts(
        &self,
        member: Option<Uuid>,
    ) -> Result<Vec<StatusCount>, RepositoryError>;
}

/// Task store
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn insert_task(&self, task: &Task) -> Result<(), RepositoryError>;

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, RepositoryError>;

    /// Highest priority first, then oldest
    async fn list_tasks(
        &self,
        filter: &TaskFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Task>, RepositoryError>;

    async fn update_task(&self, task: &Task) -> Result<(), RepositoryError>;

    async fn delete_task(&self, id: Uuid) -> Result<bool, RepositoryError>;

    async fn task_status_counts(&self, scope: TaskScope) -> Result<Vec<StatusCount>, RepositoryError>;

    /// Open tasks due before `today`
    async fn count_overdue_tasks(
        &self,
        scope: TaskScope,
        today: NaiveDate,
    ) -> Result<i64, RepositoryError>;
}

fn map_write_error(err: sqlx::Error) -> RepositoryError {
    if is_foreign_key_violation(&err) {
        RepositoryError::NotFound("Referenced user or project".to_string())
    } else {
        RepositoryError::from(err)
    }
}

fn status_counts(rows: Vec<(String, i64)>) -> Result<Vec<StatusCount>, RepositoryError> {
    rows.into_iter()
        .map(|(status, count)| {
            Ok(StatusCount {
                status: status.parse()?,
                count,
            })
        })
        .collect()
}

fn push_task_scope(query: &mut QueryBuilder<'_, Postgres>, scope: TaskScope) {
    match scope {
        TaskScope::All => {}
        TaskScope::VisibleTo(user_id) => {
            query
                .push(" AND (t.assigned_to = ")
                .push_bind(user_id)
                .push(" OR p.created_by = ")
                .push_bind(user_id)
                .push(" OR p.responsible_id = ")
                .push_bind(user_id)
                .push(")");
        }
        TaskScope::AssignedTo(user_id) => {
            query.push(" AND t.assigned_to = ").push_bind(user_id);
        }
    }
}

/// PostgreSQL project store
pub struct PgProjectRepository {
    pool: PgPool,
}

impl PgProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectRepository for PgProjectRepository {
    async fn insert_project(&self, project: &Project) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO projects (id, name, description, status, created_by, responsible_id, start_date, end_date, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(project.id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.status.as_str())
        .bind(project.created_by)
        .bind(project.responsible_id)
        .bind(project.start_date)
        .bind(project.end_date)
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, RepositoryError> {
        let query = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1");

        sqlx::query_as::<_, ProjectRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Project::try_from)
            .transpose()
    }

    async fn list_projects(
        &self,
        filter: &ProjectFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Project>, RepositoryError> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE TRUE"));

        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(member) = filter.member {
            query
                .push(" AND (created_by = ")
                .push_bind(member)
                .push(" OR responsible_id = ")
                .push_bind(member)
                .push(")");
        }

        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = query
            .build_query_as::<ProjectRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Project::try_from).collect()
    }

    async fn update_project(&self, project: &Project) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE projects SET name = $2, description = $3, status = $4, responsible_id = $5, \
             start_date = $6, end_date = $7, updated_at = $8 WHERE id = $1",
        )
        .bind(project.id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.status.as_str())
        .bind(project.responsible_id)
        .bind(project.start_date)
        .bind(project.end_date)
        .bind(project.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound("Project".to_string()));
        }
        Ok(())
    }

    async fn delete_project(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn project_status_counts(
        &self,
        member: Option<Uuid>,
    ) -> Result<Vec<StatusCount>, RepositoryError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM projects \
             WHERE ($1::uuid IS NULL OR created_by = $1 OR responsible_id = $1) \
             GROUP BY status",
        )
        .bind(member)
        .fetch_all(&self.pool)
        .await?;

        status_counts(rows)
    }
}

/// PostgreSQL task store
pub struct PgTaskRepository {
    pool: PgPool,
}

impl PgTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for PgTaskRepository {
    async fn insert_task(&self, task: &Task) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO tasks (id, project_id, title, description, status, priority, assigned_to, created_by, due_date, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(task.id)
        .bind(task.project_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.assigned_to)
        .bind(task.created_by)
        .bind(task.due_date)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, RepositoryError> {
        let query = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1");

        sqlx::query_as::<_, TaskRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Task::try_from)
            .transpose()
    }

    async fn list_tasks(
        &self,
        filter: &TaskFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Task>, RepositoryError> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {TASK_COLUMNS} FROM tasks WHERE TRUE"));

        if let Some(project_id) = filter.project_id {
            query.push(" AND project_id = ").push_bind(project_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(assigned_to) = filter.assigned_to {
            query.push(" AND assigned_to = ").push_bind(assigned_to);
        }

        query
            .push(
                " ORDER BY CASE priority WHEN 'urgent' THEN 0 WHEN 'high' THEN 1 \
                 WHEN 'medium' THEN 2 ELSE 3 END, created_at ASC LIMIT ",
            )
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = query
            .build_query_as::<TaskRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Task::try_from).collect()
    }

    async fn update_task(&self, task: &Task) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE tasks SET title = $2, description = $3, status = $4, priority = $5, \
             assigned_to = $6, due_date = $7, updated_at = $8 WHERE id = $1",
        )
        .bind(task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.assigned_to)
        .bind(task.due_date)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound("Task".to_string()));
        }
        Ok(())
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn task_status_counts(&self, scope: TaskScope) -> Result<Vec<StatusCount>, RepositoryError> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT t.status, COUNT(*) FROM tasks t JOIN projects p ON p.id = t.project_id WHERE TRUE",
        );
        push_task_scope(&mut query, scope);
        query.push(" GROUP BY t.status");

        let rows = query
            .build_query_as::<(String, i64)>()
            .fetch_all(&self.pool)
            .await?;

        status_counts(rows)
    }

    async fn count_overdue_tasks(
        &self,
        scope: TaskScope,
        today: NaiveDate,
    ) -> Result<i64, RepositoryError> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT COUNT(*) FROM tasks t JOIN projects p ON p.id = t.project_id \
             WHERE t.status IN ('pending', 'in_progress') AND t.due_date < ",
        );
        query.push_bind(today);
        push_task_scope(&mut query, scope);

        Ok(query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?)
    }
}
