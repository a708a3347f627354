//! Network adapter
//!
//! Tasks are attached to the pod network right after they start and
//! detached right before they are deleted. The namespace is located through
//! the task's init process, so detaching has to happen while the task still
//! exists.

pub mod bridge;
pub mod config;

pub use bridge::BridgeNetwork;
pub use config::{Attachment, IpAllocator};

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Network setup and teardown for tasks
#[async_trait]
pub trait NetworkAttacher: Send + Sync {
    /// Attach a task's network namespace to the pod network
    async fn attach(&self, task_id: &str, netns: &Path) -> Result<()>;

    /// Detach a task's network namespace. Detaching an unknown task succeeds.
    async fn detach(&self, task_id: &str, netns: &Path) -> Result<()>;
}

/// Network namespace path of a process
pub fn netns_path(pid: u32) -> PathBuf {
    PathBuf::from(format!("/proc/{}/ns/net", pid))
}
