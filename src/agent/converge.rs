//! Container convergence
//!
//! Drives one container toward "task running and attached", re-deriving the
//! current state from the runtime on every call. Nothing is remembered
//! between calls, so running it against a converged container only reads.
//!
//! Cancellation is honoured before each step that changes state, except
//! between starting a task and attaching it: a running task without a
//! network would look converged to the next pass.

use crate::error::{Result, RudderError};
use crate::network::{netns_path, NetworkAttacher};
use crate::runtime::{ContainerHandle, ContainerRuntime, Image, TaskHandle, TaskStatus};
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// What convergence had to do for a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// The task was already running; nothing changed
    AlreadyRunning,
    /// No task existed; one was created, started and attached
    Started,
    /// A task in the given state was torn down and replaced
    Restarted(TaskStatus),
}

impl fmt::Display for Convergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Convergence::AlreadyRunning => write!(f, "already running"),
            Convergence::Started => write!(f, "started"),
            Convergence::Restarted(previous) => write!(f, "restarted from {}", previous),
        }
    }
}

/// Convergence state machine over a runtime and a network
pub struct Converger<'a> {
    runtime: &'a dyn ContainerRuntime,
    network: &'a dyn NetworkAttacher,
}

impl<'a> Converger<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, network: &'a dyn NetworkAttacher) -> Self {
        Self { runtime, network }
    }

    /// Converge the container `container_id` running `image_ref`.
    ///
    /// Any failing step aborts this container only; the next call picks up
    /// from whatever state the runtime is left in.
    pub async fn converge(
        &self,
        container_id: &str,
        image_ref: &str,
        cancel: &CancellationToken,
    ) -> Result<Convergence> {
        let image = self.ensure_image(image_ref, cancel).await?;
        let container = self.ensure_container(container_id, &image, cancel).await?;

        let Some(task) = self.runtime.get_task(&container).await? else {
            self.start_task(&container, cancel).await?;
            return Ok(Convergence::Started);
        };

        let status = self.runtime.task_status(&task).await?;
        if status == TaskStatus::Running {
            debug!(container = %container_id, pid = task.pid, "Task running");
            return Ok(Convergence::AlreadyRunning);
        }

        checkpoint(cancel)?;
        info!(container = %container_id, status = %status, "Replacing task");
        self.teardown_task(&task).await?;
        self.start_task(&container, cancel).await?;
        Ok(Convergence::Restarted(status))
    }

    async fn ensure_image(&self, reference: &str, cancel: &CancellationToken) -> Result<Image> {
        if let Some(image) = self.runtime.find_image(reference).await? {
            return Ok(image);
        }

        checkpoint(cancel)?;
        info!(image = %reference, "Pulling image");
        self.runtime.pull_image(reference).await
    }

    async fn ensure_container(
        &self,
        id: &str,
        image: &Image,
        cancel: &CancellationToken,
    ) -> Result<ContainerHandle> {
        if let Some(container) = self.runtime.find_container(id).await? {
            return Ok(container);
        }

        checkpoint(cancel)?;
        info!(container = %id, image = %image.name, "Creating container");
        self.runtime.create_container(id, image).await
    }

    async fn start_task(
        &self,
        container: &ContainerHandle,
        cancel: &CancellationToken,
    ) -> Result<TaskHandle> {
        checkpoint(cancel)?;
        let task = self.runtime.create_task(container).await?;
        self.runtime.start_task(&task).await?;
        info!(container = %container.id, pid = task.pid, "Started task");

        self.network.attach(&task.id, &netns_path(task.pid)).await?;
        Ok(task)
    }

    // Detach must run first: the namespace path depends on the task's pid
    async fn teardown_task(&self, task: &TaskHandle) -> Result<()> {
        self.network.detach(&task.id, &netns_path(task.pid)).await?;
        self.runtime.delete_task(task).await
    }
}

fn checkpoint(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(RudderError::Cancelled);
    }
    Ok(())
}
