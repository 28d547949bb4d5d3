//! In-memory repositories
//!
//! One [`InMemoryStore`] implements every repository trait, so a whole
//! application can run without PostgreSQL in unit and integration tests.
//! All state sits behind a single mutex; every operation, including refresh
//! token consumption, completes under one lock acquisition.

use crate::activity::{ActivityEntry, ActivityFilter, ActivityRepository, NewActivity};
use crate::auth::models::{
    BlacklistEntry, NewUser, RefreshTokenRecord, RoleAssignment, UserProfileUpdate, UserRecord,
};
use crate::auth::repository::{
    RefreshTokenRepository, RoleRepository, TokenBlacklistRepository, UserRepository,
};
use crate::db::RepositoryError;
use crate::projects::models::{Project, ProjectFilter, StatusCount, Task, TaskFilter, TaskScope};
use crate::projects::repository::{ProjectRepository, TaskRepository};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use taskhub_core::{Role, WorkStatus};
use uuid::Uuid;

#[derive(Default)]
struct State {
    users: Vec<UserRecord>,
    role_assignments: Vec<RoleAssignment>,
    refresh_tokens: HashMap<String, RefreshTokenRecord>,
    blacklist: HashMap<String, BlacklistEntry>,
    projects: Vec<Project>,
    tasks: Vec<Task>,
    activity: Vec<ActivityEntry>,
}

impl State {
    fn user_mut(&mut self, id: Uuid) -> Result<&mut UserRecord, RepositoryError> {
        self.users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| RepositoryError::NotFound("User".to_string()))
    }

    fn project(&self, id: Uuid) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    fn task_in_scope(&self, task: &Task, scope: TaskScope) -> bool {
        match scope {
            TaskScope::All => true,
            TaskScope::AssignedTo(user) => task.assigned_to == Some(user),
            TaskScope::VisibleTo(user) => {
                task.assigned_to == Some(user)
                    || self
                        .project(task.project_id)
                        .is_some_and(|p| p.is_owned_by(user))
            }
        }
    }

    fn check_user_reference(&self, id: Option<Uuid>) -> Result<(), RepositoryError> {
        match id {
            Some(id) if !self.users.iter().any(|u| u.id == id) => Err(RepositoryError::NotFound(
                "Referenced user or project".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Repository implementation backed by process memory
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert an active user with an unusable password hash
    pub async fn seed_user(&self, email: &str, is_admin: bool) -> UserRecord {
        let name = email.split('@').next().unwrap_or(email).to_string();
        let now = Utc::now();
        let user = UserRecord {
            id: Uuid::new_v4(),
            name,
            email: email.trim().to_lowercase(),
            password_hash: String::new(),
            phone: None,
            is_active: true,
            is_admin,
            created_at: now,
            updated_at: now,
        };
        self.state().users.push(user.clone());
        user
    }
}

fn paginate<T>(items: impl Iterator<Item = T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

/// Only statuses that occur, like a SQL `GROUP BY`
fn count_by_status(statuses: impl Iterator<Item = WorkStatus>) -> Vec<StatusCount> {
    let mut counts: HashMap<WorkStatus, i64> = HashMap::new();
    for status in statuses {
        *counts.entry(status).or_default() += 1;
    }

    WorkStatus::ALL
        .iter()
        .filter_map(|status| {
            counts.get(status).map(|count| StatusCount {
                status: *status,
                count: *count,
            })
        })
        .collect()
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, RepositoryError> {
        let mut state = self.state();
        if state
            .users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(RepositoryError::EmailAlreadyExists);
        }

        let now = Utc::now();
        let record = UserRecord {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            phone: user.phone,
            is_active: true,
            is_admin: user.is_admin,
            created_at: now,
            updated_at: now,
        };
        state.users.push(record.clone());
        Ok(record)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepositoryError> {
        Ok(self
            .state()
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepositoryError> {
        Ok(self.state().users.iter().find(|u| u.id == id).cloned())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), RepositoryError> {
        let mut state = self.state();
        let user = state.user_mut(id)?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: &UserProfileUpdate,
    ) -> Result<UserRecord, RepositoryError> {
        let mut state = self.state();
        let user = state.user_mut(id)?;
        if let Some(name) = &update.name {
            user.name = name.clone();
        }
        if let Some(phone) = &update.phone {
            user.phone = Some(phone.clone());
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<UserRecord, RepositoryError> {
        let mut state = self.state();
        let user = state.user_mut(id)?;
        user.is_active = active;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_admin(&self, id: Uuid, is_admin: bool) -> Result<UserRecord, RepositoryError> {
        let mut state = self.state();
        let user = state.user_mut(id)?;
        user.is_admin = is_admin;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<UserRecord>, RepositoryError> {
        let state = self.state();
        Ok(paginate(state.users.iter().rev().cloned(), limit, offset))
    }
}

#[async_trait]
impl RoleRepository for InMemoryStore {
    async fn active_roles(&self, user_id: Uuid) -> Result<Vec<Role>, RepositoryError> {
        let state = self.state();
        Ok(Role::ALL
            .into_iter()
            .filter(|role| {
                state
                    .role_assignments
                    .iter()
                    .any(|a| a.user_id == user_id && a.role == *role && a.active)
            })
            .collect())
    }

    async fn list_assignments(&self, user_id: Uuid) -> Result<Vec<RoleAssignment>, RepositoryError> {
        Ok(self
            .state()
            .role_assignments
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn assign_role(
        &self,
        user_id: Uuid,
        role: Role,
        assigned_by: Option<Uuid>,
    ) -> Result<RoleAssignment, RepositoryError> {
        let mut state = self.state();
        if !state.users.iter().any(|u| u.id == user_id) {
            return Err(RepositoryError::NotFound("User".to_string()));
        }

        let now = Utc::now();
        if let Some(existing) = state
            .role_assignments
            .iter_mut()
            .find(|a| a.user_id == user_id && a.role == role)
        {
            existing.active = true;
            existing.assigned_by = assigned_by;
            existing.assigned_at = now;
            existing.revoked_at = None;
            return Ok(existing.clone());
        }

        let assignment = RoleAssignment {
            user_id,
            role,
            active: true,
            assigned_by,
            assigned_at: now,
            revoked_at: None,
        };
        state.role_assignments.push(assignment.clone());
        Ok(assignment)
    }

    async fn revoke_role(&self, user_id: Uuid, role: Role) -> Result<bool, RepositoryError> {
        let mut state = self.state();
        match state
            .role_assignments
            .iter_mut()
            .find(|a| a.user_id == user_id && a.role == role && a.active)
        {
            Some(assignment) => {
                assignment.active = false;
                assignment.revoked_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryStore {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), RepositoryError> {
        self.state()
            .refresh_tokens
            .insert(record.token_hash.clone(), record.clone());
        Ok(())
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, RepositoryError> {
        Ok(self.state().refresh_tokens.get(token_hash).cloned())
    }

    async fn consume(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, RepositoryError> {
        let mut state = self.state();
        match state.refresh_tokens.get_mut(token_hash) {
            Some(record) if record.is_valid() => {
                record.revoked_at = Some(Utc::now());
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn revoke(&self, token_hash: &str, owner: Option<Uuid>) -> Result<bool, RepositoryError> {
        let mut state = self.state();
        match state.refresh_tokens.get_mut(token_hash) {
            Some(record)
                if !record.is_revoked() && owner.map_or(true, |o| o == record.user_id) =>
            {
                record.revoked_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, RepositoryError> {
        let mut state = self.state();
        let now = Utc::now();
        let mut revoked = 0;
        for record in state.refresh_tokens.values_mut() {
            if record.user_id == user_id && !record.is_revoked() {
                record.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn delete_expired(&self) -> Result<u64, RepositoryError> {
        let mut state = self.state();
        let before = state.refresh_tokens.len();
        state.refresh_tokens.retain(|_, record| !record.is_expired());
        Ok((before - state.refresh_tokens.len()) as u64)
    }
}

#[async_trait]
impl TokenBlacklistRepository for InMemoryStore {
    async fn insert(&self, entry: &BlacklistEntry) -> Result<(), RepositoryError> {
        self.state()
            .blacklist
            .entry(entry.token_jti.clone())
            .or_insert_with(|| entry.clone());
        Ok(())
    }

    async fn is_blacklisted(&self, jti: &str) -> Result<bool, RepositoryError> {
        Ok(self
            .state()
            .blacklist
            .get(jti)
            .is_some_and(|entry| !entry.is_expired()))
    }

    async fn delete_expired(&self) -> Result<u64, RepositoryError> {
        let mut state = self.state();
        let before = state.blacklist.len();
        state.blacklist.retain(|_, entry| !entry.is_expired());
        Ok((before - state.blacklist.len()) as u64)
    }
}

#[async_trait]
impl ProjectRepository for InMemoryStore {
    async fn insert_project(&self, project: &Project) -> Result<(), RepositoryError> {
        let mut state = self.state();
        state.check_user_reference(Some(project.created_by))?;
        state.check_user_reference(project.responsible_id)?;
        state.projects.push(project.clone());
        Ok(())
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, RepositoryError> {
        Ok(self.state().project(id).cloned())
    }

    async fn list_projects(
        &self,
        filter: &ProjectFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Project>, RepositoryError> {
        let state = self.state();
        let matching = state.projects.iter().rev().filter(|p| filter.matches(p)).cloned();
        Ok(paginate(matching, limit, offset))
    }

    async fn update_project(&self, project: &Project) -> Result<(), RepositoryError> {
        let mut state = self.state();
        state.check_user_reference(project.responsible_id)?;
        let existing = state
            .projects
            .iter_mut()
            .find(|p| p.id == project.id)
            .ok_or_else(|| RepositoryError::NotFound("Project".to_string()))?;
        *existing = project.clone();
        Ok(())
    }

    async fn delete_project(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut state = self.state();
        let before = state.projects.len();
        state.projects.retain(|p| p.id != id);
        if state.projects.len() == before {
            return Ok(false);
        }
        state.tasks.retain(|t| t.project_id != id);
        Ok(true)
    }

    async fn project_status_counts(
        &self,
        member: Option<Uuid>,
    ) -> Result<Vec<StatusCount>, RepositoryError> {
        let state = self.state();
        Ok(count_by_status(
            state
                .projects
                .iter()
                .filter(|p| member.map_or(true, |user| p.is_owned_by(user)))
                .map(|p| p.status),
        ))
    }
}

#[async_trait]
impl TaskRepository for InMemoryStore {
    async fn insert_task(&self, task: &Task) -> Result<(), RepositoryError> {
        let mut state = self.state();
        if state.project(task.project_id).is_none() {
            return Err(RepositoryError::NotFound(
                "Referenced user or project".to_string(),
            ));
        }
        state.check_user_reference(task.assigned_to)?;
        state.tasks.push(task.clone());
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, RepositoryError> {
        Ok(self.state().tasks.iter().find(|t| t.id == id).cloned())
    }

    async fn list_tasks(
        &self,
        filter: &TaskFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Task>, RepositoryError> {
        let state = self.state();
        let mut matching: Vec<Task> = state
            .tasks
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        // stable sort keeps creation order within a priority
        matching.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(paginate(matching.into_iter(), limit, offset))
    }

    async fn update_task(&self, task: &Task) -> Result<(), RepositoryError> {
        let mut state = self.state();
        state.check_user_reference(task.assigned_to)?;
        let existing = state
            .tasks
            .iter_mut()
            .find(|t| t.id == task.id)
            .ok_or_else(|| RepositoryError::NotFound("Task".to_string()))?;
        *existing = task.clone();
        Ok(())
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut state = self.state();
        let before = state.tasks.len();
        state.tasks.retain(|t| t.id != id);
        Ok(state.tasks.len() < before)
    }

    async fn task_status_counts(&self, scope: TaskScope) -> Result<Vec<StatusCount>, RepositoryError> {
        let state = self.state();
        Ok(count_by_status(
            state
                .tasks
                .iter()
                .filter(|t| state.task_in_scope(t, scope))
                .map(|t| t.status),
        ))
    }

    async fn count_overdue_tasks(
        &self,
        scope: TaskScope,
        today: NaiveDate,
    ) -> Result<i64, RepositoryError> {
        let state = self.state();
        Ok(state
            .tasks
            .iter()
            .filter(|t| state.task_in_scope(t, scope) && t.is_overdue(today))
            .count() as i64)
    }
}

#[async_trait]
impl ActivityRepository for InMemoryStore {
    async fn append(&self, entry: NewActivity) -> Result<ActivityEntry, RepositoryError> {
        let record = ActivityEntry {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            action: entry.action,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            details: entry.details,
            created_at: Utc::now(),
        };
        self.state().activity.push(record.clone());
        Ok(record)
    }

    async fn list_activity(
        &self,
        filter: &ActivityFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ActivityEntry>, RepositoryError> {
        let state = self.state();
        let matching = state.activity.iter().rev().filter(|e| filter.matches(e)).cloned();
        Ok(paginate(matching, limit, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_duplicate_email_is_case_insensitive() {
        let store = InMemoryStore::default();
        let new_user = |email: &str| NewUser {
            name: "A".to_string(),
            email: email.to_string(),
            password_hash: "h".to_string(),
            phone: None,
            is_admin: false,
        };

        store.create_user(new_user("alice@example.com")).await.unwrap();
        assert!(matches!(
            store.create_user(new_user("Alice@Example.com")).await,
            Err(RepositoryError::EmailAlreadyExists)
        ));
    }

    #[tokio::test]
    async fn test_consume_only_once() {
        let store = InMemoryStore::default();
        let record =
            RefreshTokenRecord::new(Uuid::new_v4(), "hash".to_string(), Utc::now() + Duration::days(1));
        RefreshTokenRepository::insert(&store, &record).await.unwrap();

        assert!(store.consume("hash").await.unwrap().is_some());
        assert!(store.consume("hash").await.unwrap().is_none());
        assert!(store.consume("missing").await.unwrap().is_none());
    }

    #[test]
    fn test_count_by_status_skips_absent() {
        let counts = count_by_status(
            [WorkStatus::Pending, WorkStatus::Completed, WorkStatus::Pending].into_iter(),
        );
        assert_eq!(
            counts,
            vec![
                StatusCount {
                    status: WorkStatus::Pending,
                    count: 2
                },
                StatusCount {
                    status: WorkStatus::Completed,
                    count: 1
                },
            ]
        );
    }
}
