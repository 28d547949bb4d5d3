//! TaskHub Core - Domain types, roles, and shared configuration
//!
//! This crate defines the abstractions shared by the API server and the CLI:
//! - Role and capability reference data for access control
//! - Work status and priority enums for projects and tasks
//! - Common error types
//! - Configuration management

pub mod config;

pub use config::{AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig, ServerConfig};

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for TaskHub operations
#[derive(Error, Debug)]
pub enum TaskhubError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Access denied: {reason}")]
    AccessDenied { reason: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TaskhubError>;

impl From<ConfigError> for TaskhubError {
    fn from(err: ConfigError) -> Self {
        TaskhubError::ConfigError(err.to_string())
    }
}

// ============================================================================
// Access Control
// ============================================================================

/// A single thing a principal may be allowed to do.
///
/// Capabilities are a closed set so that every authorization rule in the
/// server names one of these variants instead of a free-form string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    UsersRead,
    UsersManage,
    RolesManage,
    ProjectsCreate,
    ProjectsRead,
    ProjectsUpdate,
    ProjectsDelete,
    TasksCreate,
    TasksRead,
    TasksUpdate,
    TasksDelete,
    DashboardRead,
    ActivityRead,
}

impl Capability {
    pub const ALL: [Capability; 13] = [
        Capability::UsersRead,
        Capability::UsersManage,
        Capability::RolesManage,
        Capability::ProjectsCreate,
        Capability::ProjectsRead,
        Capability::ProjectsUpdate,
        Capability::ProjectsDelete,
        Capability::TasksCreate,
        Capability::TasksRead,
        Capability::TasksUpdate,
        Capability::TasksDelete,
        Capability::DashboardRead,
        Capability::ActivityRead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::UsersRead => "users:read",
            Capability::UsersManage => "users:manage",
            Capability::RolesManage => "roles:manage",
            Capability::ProjectsCreate => "projects:create",
            Capability::ProjectsRead => "projects:read",
            Capability::ProjectsUpdate => "projects:update",
            Capability::ProjectsDelete => "projects:delete",
            Capability::TasksCreate => "tasks:create",
            Capability::TasksRead => "tasks:read",
            Capability::TasksUpdate => "tasks:update",
            Capability::TasksDelete => "tasks:delete",
            Capability::DashboardRead => "dashboard:read",
            Capability::ActivityRead => "activity:read",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named permission bucket assigned to users.
///
/// Roles are static reference data seeded by the initial migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    ResponsableProyecto,
    ResponsableTarea,
}

const PROJECT_LEAD_CAPABILITIES: &[Capability] = &[
    Capability::UsersRead,
    Capability::ProjectsCreate,
    Capability::ProjectsRead,
    Capability::ProjectsUpdate,
    Capability::TasksCreate,
    Capability::TasksRead,
    Capability::TasksUpdate,
    Capability::TasksDelete,
    Capability::DashboardRead,
    Capability::ActivityRead,
];

const TASK_LEAD_CAPABILITIES: &[Capability] = &[
    Capability::ProjectsRead,
    Capability::TasksRead,
    Capability::TasksUpdate,
    Capability::DashboardRead,
];

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::ResponsableProyecto, Role::ResponsableTarea];

    /// Convert role to its stored string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::ResponsableProyecto => "responsable_proyecto",
            Role::ResponsableTarea => "responsable_tarea",
        }
    }

    /// Capabilities granted by holding this role
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::Admin => &Capability::ALL,
            Role::ResponsableProyecto => PROJECT_LEAD_CAPABILITIES,
            Role::ResponsableTarea => TASK_LEAD_CAPABILITIES,
        }
    }

    pub fn grants(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = TaskhubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "responsable_proyecto" => Ok(Role::ResponsableProyecto),
            "responsable_tarea" => Ok(Role::ResponsableTarea),
            other => Err(TaskhubError::ValidationError(format!("Unknown role: {other}"))),
        }
    }
}

// ============================================================================
// Work Items
// ============================================================================

/// Lifecycle status shared by projects and tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl WorkStatus {
    pub const ALL: [WorkStatus; 4] = [
        WorkStatus::Pending,
        WorkStatus::InProgress,
        WorkStatus::Completed,
        WorkStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStatus::Pending => "pending",
            WorkStatus::InProgress => "in_progress",
            WorkStatus::Completed => "completed",
            WorkStatus::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled items are never overdue
    pub fn is_open(&self) -> bool {
        matches!(self, WorkStatus::Pending | WorkStatus::InProgress)
    }
}

impl std::fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkStatus {
    type Err = TaskhubError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(WorkStatus::Pending),
            "in_progress" => Ok(WorkStatus::InProgress),
            "completed" => Ok(WorkStatus::Completed),
            "cancelled" => Ok(WorkStatus::Cancelled),
            other => Err(TaskhubError::ValidationError(format!("Unknown status: {other}"))),
        }
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = TaskhubError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "urgent" => Ok(TaskPriority::Urgent),
            other => Err(TaskhubError::ValidationError(format!("Unknown priority: {other}"))),
        }
    }
}
