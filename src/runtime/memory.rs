//! Process-local container runtime
//!
//! Keeps image, container and task records in memory and enforces the same
//! task state transitions a real runtime would. Used for development and
//! tests; nothing is actually executed.

use super::{ContainerHandle, ContainerRuntime, Image, TaskHandle, TaskStatus};
use crate::error::{Result, RudderError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;
use uuid::Uuid;

const FIRST_PID: u32 = 1000;

#[derive(Debug, Clone)]
struct TaskRecord {
    handle: TaskHandle,
    status: TaskStatus,
}

#[derive(Debug, Default)]
struct RuntimeState {
    images: HashMap<String, Image>,
    containers: HashMap<String, ContainerHandle>,
    /// Tasks indexed by container ID
    tasks: HashMap<String, TaskRecord>,
    unpullable: HashSet<String>,
    next_pid: u32,
}

/// In-memory runtime
#[derive(Debug, Clone, Default)]
pub struct InMemoryRuntime {
    state: Arc<RwLock<RuntimeState>>,
}

impl InMemoryRuntime {
    /// Create an empty runtime
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RuntimeState>> {
        self.state
            .read()
            .map_err(|_| RudderError::Runtime("Failed to acquire read lock".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RuntimeState>> {
        self.state
            .write()
            .map_err(|_| RudderError::Runtime("Failed to acquire write lock".to_string()))
    }

    /// Make pulls of `reference` fail
    pub fn block_pull(&self, reference: &str) -> Result<()> {
        self.write()?.unpullable.insert(reference.to_string());
        Ok(())
    }

    /// Force a task into a state, as if its process changed on its own
    pub fn set_task_status(&self, container_id: &str, status: TaskStatus) -> Result<()> {
        let mut state = self.write()?;
        let record = state
            .tasks
            .get_mut(container_id)
            .ok_or_else(|| RudderError::Runtime(format!("No task for container {}", container_id)))?;
        record.status = status;
        Ok(())
    }

    /// All registered containers, sorted by ID
    pub fn containers(&self) -> Result<Vec<ContainerHandle>> {
        let mut containers: Vec<_> = self.read()?.containers.values().cloned().collect();
        containers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(containers)
    }

    /// All tasks with their state, sorted by container ID
    pub fn tasks(&self) -> Result<Vec<(TaskHandle, TaskStatus)>> {
        let mut tasks: Vec<_> = self
            .read()?
            .tasks
            .values()
            .map(|r| (r.handle.clone(), r.status))
            .collect();
        tasks.sort_by(|a, b| a.0.container_id.cmp(&b.0.container_id));
        Ok(tasks)
    }

    /// Number of running tasks
    pub fn running_count(&self) -> Result<usize> {
        Ok(self
            .read()?
            .tasks
            .values()
            .filter(|r| r.status == TaskStatus::Running)
            .count())
    }
}

#[async_trait]
impl ContainerRuntime for InMemoryRuntime {
    async fn find_image(&self, reference: &str) -> Result<Option<Image>> {
        Ok(self.read()?.images.get(reference).cloned())
    }

    async fn pull_image(&self, reference: &str) -> Result<Image> {
        let mut state = self.write()?;
        if state.unpullable.contains(reference) {
            return Err(RudderError::Runtime(format!("Failed to pull {}", reference)));
        }

        let image = Image {
            name: reference.to_string(),
            digest: format!("sha256:{}", Uuid::new_v4().simple()),
        };
        state.images.insert(reference.to_string(), image.clone());

        debug!(image = %reference, "Pulled image");
        Ok(image)
    }

    async fn find_container(&self, id: &str) -> Result<Option<ContainerHandle>> {
        Ok(self.read()?.containers.get(id).cloned())
    }

    async fn create_container(&self, id: &str, image: &Image) -> Result<ContainerHandle> {
        let mut state = self.write()?;
        if state.containers.contains_key(id) {
            return Err(RudderError::Runtime(format!("Container {} already exists", id)));
        }
        if !state.images.contains_key(&image.name) {
            return Err(RudderError::Runtime(format!("Image {} not present", image.name)));
        }

        let container = ContainerHandle {
            id: id.to_string(),
            image: image.name.clone(),
        };
        state.containers.insert(id.to_string(), container.clone());
        Ok(container)
    }

    async fn get_task(&self, container: &ContainerHandle) -> Result<Option<TaskHandle>> {
        Ok(self
            .read()?
            .tasks
            .get(&container.id)
            .map(|r| r.handle.clone()))
    }

    async fn create_task(&self, container: &ContainerHandle) -> Result<TaskHandle> {
        let mut state = self.write()?;
        if !state.containers.contains_key(&container.id) {
            return Err(RudderError::Runtime(format!(
                "Container {} not found",
                container.id
            )));
        }
        if state.tasks.contains_key(&container.id) {
            return Err(RudderError::Runtime(format!(
                "Task for container {} already exists",
                container.id
            )));
        }

        let pid = FIRST_PID + state.next_pid;
        state.next_pid += 1;

        let handle = TaskHandle {
            id: container.id.clone(),
            container_id: container.id.clone(),
            pid,
        };
        state.tasks.insert(
            container.id.clone(),
            TaskRecord {
                handle: handle.clone(),
                status: TaskStatus::Created,
            },
        );
        Ok(handle)
    }

    async fn task_status(&self, task: &TaskHandle) -> Result<TaskStatus> {
        self.read()?
            .tasks
            .get(&task.container_id)
            .map(|r| r.status)
            .ok_or_else(|| RudderError::Runtime(format!("Task {} not found", task.id)))
    }

    async fn start_task(&self, task: &TaskHandle) -> Result<()> {
        let mut state = self.write()?;
        let record = state
            .tasks
            .get_mut(&task.container_id)
            .ok_or_else(|| RudderError::Runtime(format!("Task {} not found", task.id)))?;

        if record.status != TaskStatus::Created {
            return Err(RudderError::Runtime(format!(
                "Task {} cannot start from state {}",
                task.id, record.status
            )));
        }
        record.status = TaskStatus::Running;
        Ok(())
    }

    async fn delete_task(&self, task: &TaskHandle) -> Result<()> {
        let mut state = self.write()?;
        match state.tasks.get(&task.container_id).map(|r| r.status) {
            None => Err(RudderError::Runtime(format!("Task {} not found", task.id))),
            Some(TaskStatus::Running) => {
                Err(RudderError::Runtime(format!("Task {} is running", task.id)))
            }
            Some(_) => {
                state.tasks.remove(&task.container_id);
                Ok(())
            }
        }
    }
}
