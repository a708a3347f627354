//! Container runtime adapter
//!
//! The node agent drives containers through [`ContainerRuntime`]: images are
//! resolved or pulled, a container is registered against an image, and a task
//! is the running instance of a container. Lookups return `Ok(None)` when
//! the object does not exist.

pub mod memory;

pub use memory::InMemoryRuntime;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A locally available image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Image reference as requested
    pub name: String,
    /// Content identifier
    pub digest: String,
}

/// A container registered with the runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerHandle {
    /// Container ID (`<pod>-<container>`)
    pub id: String,
    /// Image the container was created from
    pub image: String,
}

/// A task, the running instance of a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHandle {
    /// Task ID
    pub id: String,
    /// Owning container
    pub container_id: String,
    /// Process ID of the task's init process
    pub pid: u32,
}

/// Task state as reported by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Created,
    Running,
    Stopped,
    Paused,
    Pausing,
    Unknown,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Created => write!(f, "created"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Stopped => write!(f, "stopped"),
            TaskStatus::Paused => write!(f, "paused"),
            TaskStatus::Pausing => write!(f, "pausing"),
            TaskStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Image, container and task lifecycle operations
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Look up a locally available image
    async fn find_image(&self, reference: &str) -> Result<Option<Image>>;

    /// Pull an image
    async fn pull_image(&self, reference: &str) -> Result<Image>;

    /// Look up a container by ID
    async fn find_container(&self, id: &str) -> Result<Option<ContainerHandle>>;

    /// Register a container bound to an image
    async fn create_container(&self, id: &str, image: &Image) -> Result<ContainerHandle>;

    /// The container's task, if one exists
    async fn get_task(&self, container: &ContainerHandle) -> Result<Option<TaskHandle>>;

    /// Create a task for a container
    async fn create_task(&self, container: &ContainerHandle) -> Result<TaskHandle>;

    /// Current task state
    async fn task_status(&self, task: &TaskHandle) -> Result<TaskStatus>;

    /// Start a created task
    async fn start_task(&self, task: &TaskHandle) -> Result<()>;

    /// Delete a task that is no longer running
    async fn delete_task(&self, task: &TaskHandle) -> Result<()>;
}
