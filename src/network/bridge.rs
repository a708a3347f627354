//! Bridge network
//!
//! Allocates one address per attached task from the node's pod subnet and
//! keeps the attachment records. Attaching is idempotent for the same
//! namespace; detaching releases the address.

use super::config::{Attachment, IpAllocator};
use super::NetworkAttacher;
use crate::error::{Result, RudderError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Default bridge interface name
pub const DEFAULT_BRIDGE: &str = "rudder0";

#[derive(Debug)]
struct BridgeState {
    allocator: IpAllocator,
    attachments: HashMap<String, Attachment>,
}

/// Bridge network for pod tasks
#[derive(Debug, Clone)]
pub struct BridgeNetwork {
    name: String,
    subnet: String,
    state: Arc<Mutex<BridgeState>>,
}

impl BridgeNetwork {
    /// Create a bridge over a subnet
    pub fn new(subnet: &str) -> Result<Self> {
        Self::with_name(DEFAULT_BRIDGE, subnet)
    }

    /// Create a named bridge over a subnet
    pub fn with_name(name: &str, subnet: &str) -> Result<Self> {
        let allocator = IpAllocator::new(subnet)?;
        Ok(Self {
            name: name.to_string(),
            subnet: subnet.to_string(),
            state: Arc::new(Mutex::new(BridgeState {
                allocator,
                attachments: HashMap::new(),
            })),
        })
    }

    /// Bridge name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pod subnet
    pub fn subnet(&self) -> &str {
        &self.subnet
    }

    fn lock(&self) -> Result<MutexGuard<'_, BridgeState>> {
        self.state
            .lock()
            .map_err(|_| RudderError::Network("Failed to acquire bridge lock".to_string()))
    }

    /// Current attachment of a task
    pub fn attachment(&self, task_id: &str) -> Result<Option<Attachment>> {
        Ok(self.lock()?.attachments.get(task_id).cloned())
    }

    /// All attachments, sorted by task ID
    pub fn attachments(&self) -> Result<Vec<Attachment>> {
        let mut attachments: Vec<_> = self.lock()?.attachments.values().cloned().collect();
        attachments.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        Ok(attachments)
    }
}

#[async_trait]
impl NetworkAttacher for BridgeNetwork {
    async fn attach(&self, task_id: &str, netns: &Path) -> Result<()> {
        let mut state = self.lock()?;

        if let Some(existing) = state.attachments.get(task_id) {
            if existing.netns == netns {
                debug!(task = %task_id, "Task already attached");
                return Ok(());
            }
            return Err(RudderError::Network(format!(
                "Task {} is attached to {}",
                task_id,
                existing.netns.display()
            )));
        }

        let ip = state.allocator.allocate()?;
        let attachment = Attachment {
            task_id: task_id.to_string(),
            netns: netns.to_path_buf(),
            interface: "eth0".to_string(),
            ipv4_address: ip,
            prefix_len: state.allocator.prefix_len(),
            mac_address: generate_mac_address(),
        };

        info!(
            task = %task_id,
            bridge = %self.name,
            address = %attachment.cidr(),
            "Attached task to network"
        );
        state.attachments.insert(task_id.to_string(), attachment);
        Ok(())
    }

    async fn detach(&self, task_id: &str, netns: &Path) -> Result<()> {
        let mut state = self.lock()?;

        match state.attachments.remove(task_id) {
            Some(attachment) => {
                state.allocator.release(attachment.ipv4_address);
                info!(task = %task_id, netns = %netns.display(), "Detached task from network");
            }
            None => debug!(task = %task_id, "Task was not attached"),
        }
        Ok(())
    }
}

/// Generate a random MAC address
fn generate_mac_address() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();

    // Locally administered, unicast
    let bytes: [u8; 6] = [0x02, rng.gen(), rng.gen(), rng.gen(), rng.gen(), rng.gen()];

    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}
