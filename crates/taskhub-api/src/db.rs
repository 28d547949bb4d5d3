//! Database wiring
//!
//! Builds the PostgreSQL pool, applies migrations, and bundles every
//! repository behind a trait object so services can be constructed against
//! PostgreSQL in production and in-memory fakes in tests.

use crate::activity::{ActivityRepository, PgActivityRepository};
use crate::auth::repository::{
    PgRefreshTokenRepository, PgRoleRepository, PgTokenBlacklistRepository, PgUserRepository,
    RefreshTokenRepository, RoleRepository, TokenBlacklistRepository, UserRepository,
};
use crate::projects::repository::{
    PgProjectRepository, PgTaskRepository, ProjectRepository, TaskRepository,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;
use taskhub_core::DatabaseConfig;
use thiserror::Error;

/// Embedded schema migrations
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Repository errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid stored value: {0}")]
    InvalidData(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        RepositoryError::DatabaseError(err.to_string())
    }
}

impl From<taskhub_core::TaskhubError> for RepositoryError {
    fn from(err: taskhub_core::TaskhubError) -> Self {
        RepositoryError::InvalidData(err.to_string())
    }
}

impl From<RepositoryError> for taskhub_core::TaskhubError {
    fn from(err: RepositoryError) -> Self {
        use taskhub_core::TaskhubError;

        match err {
            RepositoryError::NotFound(what) => TaskhubError::NotFound(what),
            RepositoryError::EmailAlreadyExists => {
                TaskhubError::Conflict("Email already registered".to_string())
            }
            other => TaskhubError::DatabaseError(other.to_string()),
        }
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

/// Create the shared connection pool
///
/// The pool has a fixed upper bound; requests beyond it wait up to
/// `acquire_timeout_secs` for a connection.
pub async fn connect_pool(config: &DatabaseConfig) -> Result<PgPool, RepositoryError> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| RepositoryError::DatabaseError(format!("PostgreSQL connection failed: {e}")))
}

/// Apply pending migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), RepositoryError> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(format!("Migration failed: {e}")))
}

/// Every repository the services depend on
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub roles: Arc<dyn RoleRepository>,
    pub refresh_tokens: Arc<dyn RefreshTokenRepository>,
    pub blacklist: Arc<dyn TokenBlacklistRepository>,
    pub projects: Arc<dyn ProjectRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub activity: Arc<dyn ActivityRepository>,
}

impl Repositories {
    /// PostgreSQL-backed repositories sharing one pool
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            roles: Arc::new(PgRoleRepository::new(pool.clone())),
            refresh_tokens: Arc::new(PgRefreshTokenRepository::new(pool.clone())),
            blacklist: Arc::new(PgTokenBlacklistRepository::new(pool.clone())),
            projects: Arc::new(PgProjectRepository::new(pool.clone())),
            tasks: Arc::new(PgTaskRepository::new(pool.clone())),
            activity: Arc::new(PgActivityRepository::new(pool)),
        }
    }

    /// In-memory repositories sharing one fresh store
    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(crate::memory::InMemoryStore::default()))
    }

    /// Every repository backed by `store`, so tests can seed and inspect it
    #[cfg(any(test, feature = "test-utils"))]
    pub fn from_store(store: Arc<crate::memory::InMemoryStore>) -> Self {
        Self {
            users: store.clone(),
            roles: store.clone(),
            refresh_tokens: store.clone(),
            blacklist: store.clone(),
            projects: store.clone(),
            tasks: store.clone(),
            activity: store,
        }
    }
}
