//! Dashboard aggregation

use crate::activity::{ActivityEntry, ActivityLogger};
use crate::auth::permissions::Principal;
use crate::projects::{ProjectRepository, StatusCount, TaskRepository, TaskScope};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use taskhub_core::{Result, WorkStatus};
use utoipa::ToSchema;

/// Counts per work status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatusBreakdown {
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub total: i64,
}

impl From<Vec<StatusCount>> for StatusBreakdown {
    fn from(counts: Vec<StatusCount>) -> Self {
        let mut breakdown = StatusBreakdown::default();
        for StatusCount { status, count } in counts {
            match status {
                WorkStatus::Pending => breakdown.pending += count,
                WorkStatus::InProgress => breakdown.in_progress += count,
                WorkStatus::Completed => breakdown.completed += count,
                WorkStatus::Cancelled => breakdown.cancelled += count,
            }
            breakdown.total += count;
        }
        breakdown
    }
}

/// Dashboard summary
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardSummary {
    pub projects: StatusBreakdown,
    pub tasks: StatusBreakdown,
    pub overdue_tasks: i64,
    pub my_tasks: StatusBreakdown,
}

/// Aggregates over projects, tasks and activity
#[derive(Clone)]
pub struct DashboardService {
    projects: Arc<dyn ProjectRepository>,
    tasks: Arc<dyn TaskRepository>,
    activity: ActivityLogger,
}

impl DashboardService {
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        tasks: Arc<dyn TaskRepository>,
        activity: ActivityLogger,
    ) -> Self {
        Self {
            projects,
            tasks,
            activity,
        }
    }

    /// Global figures for administrators; everyone else sees the projects they
    /// own and the tasks in them or assigned to them.
    pub async fn summary(&self, principal: &Principal) -> Result<DashboardSummary> {
        let (member, scope) = if principal.is_administrator() {
            (None, TaskScope::All)
        } else {
            (Some(principal.user_id), TaskScope::VisibleTo(principal.user_id))
        };
        let today = Utc::now().date_naive();

        let (projects, tasks, overdue_tasks, my_tasks) = futures::try_join!(
            self.projects.project_status_counts(member),
            self.tasks.task_status_counts(scope),
            self.tasks.count_overdue_tasks(scope, today),
            self.tasks
                .task_status_counts(TaskScope::AssignedTo(principal.user_id)),
        )?;

        Ok(DashboardSummary {
            projects: projects.into(),
            tasks: tasks.into(),
            overdue_tasks,
            my_tasks: my_tasks.into(),
        })
    }

    pub async fn recent_activity(
        &self,
        principal: &Principal,
        limit: i64,
    ) -> Result<Vec<ActivityEntry>> {
        Ok(self
            .activity
            .recent_for(principal, limit.clamp(1, 100))
            .await?)
    }
}
