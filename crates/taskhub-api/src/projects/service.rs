//! Project and task services
//!
//! Authorization happens here rather than in route middleware because the
//! ownership half of `OwnerOrRoleOrAdmin` needs the resource loaded first.

use super::models::{
    page, CreateProjectRequest, CreateTaskRequest, Project, ProjectFilter, ProjectQuery, Task,
    TaskFilter, TaskQuery, UpdateProjectRequest, UpdateTaskRequest,
};
use super::repository::{ProjectRepository, TaskRepository};
use crate::activity::{ActivityAction, ActivityLogger, EntityType};
use crate::auth::permissions::{AccessRule, Ownership, Principal};
use crate::auth::repository::UserRepository;
use chrono::{NaiveDate, Utc};
use serde_json::json;
use std::sync::Arc;
use taskhub_core::{Capability, Result, TaskhubError};
use uuid::Uuid;
use validator::Validate;

fn validation(errors: validator::ValidationErrors) -> TaskhubError {
    TaskhubError::ValidationError(errors.to_string())
}

fn check_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(TaskhubError::ValidationError(
            "end_date must not be before start_date".to_string(),
        )),
        _ => Ok(()),
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Referenced users must exist and be active
async fn ensure_active_user(users: &dyn UserRepository, user_id: Uuid, role: &str) -> Result<()> {
    match users.find_by_id(user_id).await? {
        Some(user) if user.is_active => Ok(()),
        _ => Err(TaskhubError::ValidationError(format!(
            "{role} must be an existing active user"
        ))),
    }
}

async fn load_project(projects: &dyn ProjectRepository, id: Uuid) -> Result<Project> {
    projects
        .get_project(id)
        .await?
        .ok_or_else(|| TaskhubError::NotFound("Project".to_string()))
}

/// Project operations
#[derive(Clone)]
pub struct ProjectService {
    projects: Arc<dyn ProjectRepository>,
    users: Arc<dyn UserRepository>,
    activity: ActivityLogger,
}

impl ProjectService {
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        users: Arc<dyn UserRepository>,
        activity: ActivityLogger,
    ) -> Self {
        Self {
            projects,
            users,
            activity,
        }
    }

    pub async fn create(&self, principal: &Principal, request: CreateProjectRequest) -> Result<Project> {
        principal.require(
            AccessRule::RoleOrAdmin(Capability::ProjectsCreate),
            Ownership::NotOwner,
        )?;

        let request = CreateProjectRequest {
            name: request.name.trim().to_string(),
            description: trimmed(request.description),
            ..request
        };
        request.validate().map_err(validation)?;
        check_dates(request.start_date, request.end_date)?;

        if let Some(responsible) = request.responsible_id {
            ensure_active_user(self.users.as_ref(), responsible, "Responsible").await?;
        }

        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            name: request.name,
            description: request.description,
            status: request.status.unwrap_or_default(),
            created_by: principal.user_id,
            responsible_id: request.responsible_id,
            start_date: request.start_date,
            end_date: request.end_date,
            created_at: now,
            updated_at: now,
        };

        self.projects.insert_project(&project).await?;

        self.activity
            .record(
                Some(principal.user_id),
                ActivityAction::Created,
                EntityType::Project,
                project.id,
                json!({ "name": project.name, "status": project.status }),
            )
            .await;

        Ok(project)
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> Result<Project> {
        let project = load_project(self.projects.as_ref(), id).await?;

        principal.require(
            AccessRule::OwnerOrRoleOrAdmin(Capability::ProjectsRead),
            project.is_owned_by(principal.user_id).into(),
        )?;

        Ok(project)
    }

    /// Everything for readers; otherwise only projects the caller owns
    pub async fn list(&self, principal: &Principal, query: ProjectQuery) -> Result<Vec<Project>> {
        let (limit, offset) = page(query.limit, query.offset);
        let member = if principal.has_capability(Capability::ProjectsRead) {
            None
        } else {
            Some(principal.user_id)
        };

        let filter = ProjectFilter {
            status: query.status,
            member,
        };

        Ok(self.projects.list_projects(&filter, limit, offset).await?)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: Uuid,
        request: UpdateProjectRequest,
    ) -> Result<Project> {
        let mut project = load_project(self.projects.as_ref(), id).await?;

        principal.require(
            AccessRule::OwnerOrRoleOrAdmin(Capability::ProjectsUpdate),
            project.is_owned_by(principal.user_id).into(),
        )?;

        let request = UpdateProjectRequest {
            name: request.name.map(|n| n.trim().to_string()),
            ..request
        };
        request.validate().map_err(validation)?;

        if let Some(responsible) = request.responsible_id {
            if project.responsible_id != Some(responsible) {
                ensure_active_user(self.users.as_ref(), responsible, "Responsible").await?;
            }
        }

        let previous_status = project.status;
        let previous_responsible = project.responsible_id;

        if let Some(name) = request.name {
            project.name = name;
        }
        if let Some(description) = request.description {
            project.description = trimmed(Some(description));
        }
        if let Some(status) = request.status {
            project.status = status;
        }
        if request.responsible_id.is_some() {
            project.responsible_id = request.responsible_id;
        }
        if request.start_date.is_some() {
            project.start_date = request.start_date;
        }
        if request.end_date.is_some() {
            project.end_date = request.end_date;
        }
        check_dates(project.start_date, project.end_date)?;

        project.updated_at = Utc::now();
        self.projects.update_project(&project).await?;

        let action = if project.status != previous_status {
            ActivityAction::StatusChanged
        } else if project.responsible_id != previous_responsible {
            ActivityAction::Assigned
        } else {
            ActivityAction::Updated
        };

        self.activity
            .record(
                Some(principal.user_id),
                action,
                EntityType::Project,
                project.id,
                json!({
                    "from_status": previous_status,
                    "status": project.status,
                    "responsible_id": project.responsible_id,
                }),
            )
            .await;

        Ok(project)
    }

    /// Delete a project together with its tasks
    pub async fn delete(&self, principal: &Principal, id: Uuid) -> Result<()> {
        let project = load_project(self.projects.as_ref(), id).await?;

        principal.require(
            AccessRule::OwnerOrRoleOrAdmin(Capability::ProjectsDelete),
            project.is_owned_by(principal.user_id).into(),
        )?;

        if !self.projects.delete_project(id).await? {
            return Err(TaskhubError::NotFound("Project".to_string()));
        }

        self.activity
            .record(
                Some(principal.user_id),
                ActivityAction::Deleted,
                EntityType::Project,
                id,
                json!({ "name": project.name }),
            )
            .await;

        Ok(())
    }
}

/// Task operations
#[derive(Clone)]
pub struct TaskService {
    projects: Arc<dyn ProjectRepository>,
    tasks: Arc<dyn TaskRepository>,
    users: Arc<dyn UserRepository>,
    activity: ActivityLogger,
}

impl TaskService {
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        tasks: Arc<dyn TaskRepository>,
        users: Arc<dyn UserRepository>,
        activity: ActivityLogger,
    ) -> Self {
        Self {
            projects,
            tasks,
            users,
            activity,
        }
    }

    /// Load a task together with whether the principal owns it
    ///
    /// Owner: the task's creator or assignee, or an owner of its project.
    async fn load_task(&self, principal: &Principal, id: Uuid) -> Result<(Task, Ownership)> {
        let task = self
            .tasks
            .get_task(id)
            .await?
            .ok_or_else(|| TaskhubError::NotFound("Task".to_string()))?;

        let user = principal.user_id;
        let owns = task.created_by == user
            || task.assigned_to == Some(user)
            || load_project(self.projects.as_ref(), task.project_id)
                .await?
                .is_owned_by(user);

        Ok((task, owns.into()))
    }

    pub async fn create(
        &self,
        principal: &Principal,
        project_id: Uuid,
        request: CreateTaskRequest,
    ) -> Result<Task> {
        let project = load_project(self.projects.as_ref(), project_id).await?;

        principal.require(
            AccessRule::OwnerOrRoleOrAdmin(Capability::TasksCreate),
            project.is_owned_by(principal.user_id).into(),
        )?;

        let request = CreateTaskRequest {
            title: request.title.trim().to_string(),
            description: trimmed(request.description),
            ..request
        };
        request.validate().map_err(validation)?;

        if let Some(assignee) = request.assigned_to {
            ensure_active_user(self.users.as_ref(), assignee, "Assignee").await?;
        }

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            project_id,
            title: request.title,
            description: request.description,
            status: request.status.unwrap_or_default(),
            priority: request.priority.unwrap_or_default(),
            assigned_to: request.assigned_to,
            created_by: principal.user_id,
            due_date: request.due_date,
            created_at: now,
            updated_at: now,
        };

        self.tasks.insert_task(&task).await?;

        self.activity
            .record(
                Some(principal.user_id),
                ActivityAction::Created,
                EntityType::Task,
                task.id,
                json!({ "project_id": project_id, "title": task.title, "assigned_to": task.assigned_to }),
            )
            .await;

        Ok(task)
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> Result<Task> {
        let (task, ownership) = self.load_task(principal, id).await?;
        principal.require(AccessRule::OwnerOrRoleOrAdmin(Capability::TasksRead), ownership)?;
        Ok(task)
    }

    /// Tasks of one project; project owners and task readers only
    pub async fn list_for_project(
        &self,
        principal: &Principal,
        project_id: Uuid,
        query: TaskQuery,
    ) -> Result<Vec<Task>> {
        let project = load_project(self.projects.as_ref(), project_id).await?;

        principal.require(
            AccessRule::OwnerOrRoleOrAdmin(Capability::TasksRead),
            project.is_owned_by(principal.user_id).into(),
        )?;

        let (limit, offset) = page(query.limit, query.offset);
        let filter = TaskFilter {
            project_id: Some(project_id),
            status: query.status,
            assigned_to: query.assigned_to,
        };

        Ok(self.tasks.list_tasks(&filter, limit, offset).await?)
    }

    /// Tasks assigned to the caller; needs no capability
    pub async fn my_tasks(&self, principal: &Principal, query: TaskQuery) -> Result<Vec<Task>> {
        let (limit, offset) = page(query.limit, query.offset);
        let filter = TaskFilter {
            project_id: None,
            status: query.status,
            assigned_to: Some(principal.user_id),
        };

        Ok(self.tasks.list_tasks(&filter, limit, offset).await?)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: Uuid,
        request: UpdateTaskRequest,
    ) -> Result<Task> {
        let (mut task, ownership) = self.load_task(principal, id).await?;
        principal.require(AccessRule::OwnerOrRoleOrAdmin(Capability::TasksUpdate), ownership)?;

        let request = UpdateTaskRequest {
            title: request.title.map(|t| t.trim().to_string()),
            ..request
        };
        request.validate().map_err(validation)?;

        if let Some(assignee) = request.assigned_to {
            if task.assigned_to != Some(assignee) {
                ensure_active_user(self.users.as_ref(), assignee, "Assignee").await?;
            }
        }

        let previous_status = task.status;
        let previous_assignee = task.assigned_to;

        if let Some(title) = request.title {
            task.title = title;
        }
        if let Some(description) = request.description {
            task.description = trimmed(Some(description));
        }
        if let Some(status) = request.status {
            task.status = status;
        }
        if let Some(priority) = request.priority {
            task.priority = priority;
        }
        if request.assigned_to.is_some() {
            task.assigned_to = request.assigned_to;
        }
        if request.due_date.is_some() {
            task.due_date = request.due_date;
        }

        task.updated_at = Utc::now();
        self.tasks.update_task(&task).await?;

        let action = if task.status != previous_status {
            ActivityAction::StatusChanged
        } else if task.assigned_to != previous_assignee {
            ActivityAction::Assigned
        } else {
            ActivityAction::Updated
        };

        self.activity
            .record(
                Some(principal.user_id),
                action,
                EntityType::Task,
                task.id,
                json!({
                    "project_id": task.project_id,
                    "from_status": previous_status,
                    "status": task.status,
                    "assigned_to": task.assigned_to,
                }),
            )
            .await;

        Ok(task)
    }

    pub async fn delete(&self, principal: &Principal, id: Uuid) -> Result<()> {
        let (task, ownership) = self.load_task(principal, id).await?;
        principal.require(AccessRule::OwnerOrRoleOrAdmin(Capability::TasksDelete), ownership)?;

        if !self.tasks.delete_task(id).await? {
            return Err(TaskhubError::NotFound("Task".to_string()));
        }

        self.activity
            .record(
                Some(principal.user_id),
                ActivityAction::Deleted,
                EntityType::Task,
                id,
                json!({ "project_id": task.project_id, "title": task.title }),
            )
            .await;

        Ok(())
    }
}
