//! Application state management

use crate::activity::ActivityLogger;
use crate::auth::{
    AuthError, AuthService, PasswordConfig, PermissionResolver, TokenService, UserAdminService,
};
use crate::dashboard::DashboardService;
use crate::db::Repositories;
use crate::projects::{ProjectService, TaskService};
use sqlx::PgPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use taskhub_core::config::AppConfig;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Ready status
    pub is_ready: AtomicBool,
    /// PostgreSQL pool; `None` when running on in-memory repositories
    pub db_pool: Option<PgPool>,
    pub auth: AuthService,
    pub tokens: TokenService,
    pub resolver: PermissionResolver,
    pub users: UserAdminService,
    pub projects: ProjectService,
    pub tasks: TaskService,
    pub dashboard: DashboardService,
    pub activity: ActivityLogger,
}

impl AppState {
    /// Wire every service over the given repositories
    pub fn new(
        config: AppConfig,
        repos: Repositories,
        db_pool: Option<PgPool>,
    ) -> Result<Self, AuthError> {
        let tokens = TokenService::new(
            &config.auth,
            repos.refresh_tokens.clone(),
            repos.blacklist.clone(),
        );
        let resolver = PermissionResolver::new(repos.roles.clone());
        let activity = ActivityLogger::new(repos.activity.clone());

        let auth = AuthService::new(
            repos.users.clone(),
            tokens.clone(),
            resolver.clone(),
            PasswordConfig::from(&config.auth),
        )?;
        let users = UserAdminService::new(
            repos.users.clone(),
            repos.roles.clone(),
            tokens.clone(),
            activity.clone(),
        );
        let projects = ProjectService::new(
            repos.projects.clone(),
            repos.users.clone(),
            activity.clone(),
        );
        let tasks = TaskService::new(
            repos.projects.clone(),
            repos.tasks.clone(),
            repos.users.clone(),
            activity.clone(),
        );
        let dashboard = DashboardService::new(repos.projects, repos.tasks, activity.clone());

        Ok(Self {
            config,
            start_time: Instant::now(),
            is_ready: AtomicBool::new(true),
            db_pool,
            auth,
            tokens,
            resolver,
            users,
            projects,
            tasks,
            dashboard,
            activity,
        })
    }

    /// State over fresh in-memory repositories
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing() -> Result<Self, AuthError> {
        Self::for_testing_with(Repositories::in_memory())
    }

    /// Like [`AppState::for_testing`], over caller-provided repositories
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing_with(repos: Repositories) -> Result<Self, AuthError> {
        let mut config = AppConfig::default();
        // cheap hashing keeps the test suite fast
        config.auth.password_memory_cost = 1024;
        config.auth.password_time_cost = 1;
        config.auth.password_parallelism = 1;
        config.auth.purge_interval_secs = 0;
        Self::new(config, repos, None)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Cleared when shutdown begins
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }

    /// Ready flag set and, when a pool is configured, the database answers
    pub async fn check_database(&self) -> bool {
        match &self.db_pool {
            Some(pool) => sqlx::query("SELECT 1").execute(pool).await.is_ok(),
            None => true,
        }
    }
}
