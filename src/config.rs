//! Role configuration
//!
//! Each long-running role takes a small config struct. The CLI fills these
//! in; library users and tests can start from `Default`.

use crate::api::REGISTRY_PREFIX;
use crate::error::{Result, RudderError};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default API server listen address
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:6443";

/// Default API server URL used by the loops
pub const DEFAULT_APISERVER_URL: &str = "http://127.0.0.1:6443";

/// Default pod subnet
pub const DEFAULT_SUBNET: &str = "10.88.0.0/16";

/// Default polling interval for the loops
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Address to listen on
    pub listen_addr: SocketAddr,
    /// Key prefix for every stored object
    pub registry_prefix: String,
    /// Directory for the filesystem registry; in-memory when unset
    pub registry_dir: Option<PathBuf>,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 6443)),
            registry_prefix: REGISTRY_PREFIX.to_string(),
            registry_dir: None,
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// API server base URL
    pub apiserver: String,
    /// Time between ticks
    pub interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            apiserver: DEFAULT_APISERVER_URL.to_string(),
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// Node agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// API server base URL
    pub apiserver: String,
    /// Name of the node this agent manages
    pub node_name: String,
    /// Subnet pod addresses are allocated from
    pub subnet: String,
    /// Time between ticks
    pub interval: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            apiserver: DEFAULT_APISERVER_URL.to_string(),
            node_name: local_hostname(),
            subnet: DEFAULT_SUBNET.to_string(),
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl AgentConfig {
    /// Reject configurations the agent cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.node_name.is_empty() {
            return Err(RudderError::InvalidConfig("node name must not be empty".to_string()));
        }
        if self.interval.is_zero() {
            return Err(RudderError::InvalidConfig("interval must be positive".to_string()));
        }
        Ok(())
    }
}

impl SchedulerConfig {
    /// Reject configurations the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(RudderError::InvalidConfig("interval must be positive".to_string()));
        }
        Ok(())
    }
}

/// Host name of this machine, used as the default node name
pub fn local_hostname() -> String {
    gethostname::gethostname().to_string_lossy().to_lowercase()
}
