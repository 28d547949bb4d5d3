//! Projects and their tasks

pub mod models;
pub mod repository;
pub mod service;

pub use models::{
    CreateProjectRequest, CreateTaskRequest, Project, ProjectQuery, StatusCount, Task, TaskQuery,
    TaskScope, UpdateProjectRequest, UpdateTaskRequest,
};
pub use repository::{ProjectRepository, TaskRepository};
pub use service::{ProjectService, TaskService};
