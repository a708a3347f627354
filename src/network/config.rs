//! Pod network addressing

use crate::error::{Result, RudderError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// A task's attachment to the pod network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Attached task
    pub task_id: String,
    /// Network namespace the interface lives in
    pub netns: PathBuf,
    /// Interface name inside the namespace
    pub interface: String,
    /// Assigned address
    pub ipv4_address: Ipv4Addr,
    /// Subnet prefix length
    pub prefix_len: u8,
    /// Interface MAC address
    pub mac_address: String,
}

impl Attachment {
    /// Address in CIDR notation
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.ipv4_address, self.prefix_len)
    }
}

/// IP address allocator for one IPv4 subnet
#[derive(Debug, Clone)]
pub struct IpAllocator {
    /// Network address
    network: u32,
    /// Prefix length
    prefix_len: u8,
    /// Allocated host addresses
    allocated: BTreeSet<u32>,
}

impl IpAllocator {
    /// Create an allocator for a subnet such as `10.88.0.0/16`.
    ///
    /// The first host address is kept for the gateway.
    pub fn new(subnet: &str) -> Result<Self> {
        let (base, prefix) = subnet
            .split_once('/')
            .ok_or_else(|| RudderError::Network(format!("Invalid subnet: {}", subnet)))?;

        let base: Ipv4Addr = base
            .parse()
            .map_err(|_| RudderError::Network(format!("Invalid IP: {}", base)))?;
        let prefix_len: u8 = prefix
            .parse()
            .ok()
            .filter(|p| *p <= 30)
            .ok_or_else(|| RudderError::Network(format!("Invalid prefix length: {}", prefix)))?;

        let mask = u32::MAX.checked_shl(32 - u32::from(prefix_len)).unwrap_or(0);
        Ok(Self {
            network: u32::from(base) & mask,
            prefix_len,
            allocated: BTreeSet::new(),
        })
    }

    /// Subnet prefix length
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Gateway address
    pub fn gateway(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network + 1)
    }

    fn broadcast(&self) -> u32 {
        self.network | (u32::MAX >> self.prefix_len)
    }

    /// Allocate the lowest free address
    pub fn allocate(&mut self) -> Result<Ipv4Addr> {
        let first = self.network + 2;
        let last = self.broadcast() - 1;

        let candidate = (first..=last)
            .find(|ip| !self.allocated.contains(ip))
            .ok_or_else(|| {
                RudderError::Network(format!(
                    "Subnet {}/{} exhausted",
                    Ipv4Addr::from(self.network),
                    self.prefix_len
                ))
            })?;

        self.allocated.insert(candidate);
        Ok(Ipv4Addr::from(candidate))
    }

    /// Release an address
    pub fn release(&mut self, ip: Ipv4Addr) {
        self.allocated.remove(&u32::from(ip));
    }

    /// Number of allocated addresses
    pub fn allocated(&self) -> usize {
        self.allocated.len()
    }
}
