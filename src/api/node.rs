//! Node resource

use super::{decode_status, HasMetadata, HasStatus, ObjectMeta, Resource};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Node address type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeAddressType {
    /// Host name
    #[default]
    Hostname,
    /// Externally routable address
    #[serde(rename = "ExternalIP")]
    ExternalIp,
    /// Cluster-internal address
    #[serde(rename = "InternalIP")]
    InternalIp,
}

impl fmt::Display for NodeAddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeAddressType::Hostname => write!(f, "Hostname"),
            NodeAddressType::ExternalIp => write!(f, "ExternalIP"),
            NodeAddressType::InternalIp => write!(f, "InternalIP"),
        }
    }
}

/// A reachable address of a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeAddress {
    /// Address value
    pub address: String,
    /// Address type
    #[serde(rename = "type")]
    pub address_type: NodeAddressType,
}

/// Observed node state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeStatus {
    /// Known addresses
    pub addresses: Vec<NodeAddress>,
}

/// An execution node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Node {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub status: NodeStatus,
}

impl Node {
    /// Create a node with the given name
    pub fn new(name: &str) -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: Self::KIND.to_string(),
            metadata: ObjectMeta::named(name),
            status: NodeStatus::default(),
        }
    }

    /// Add an address
    pub fn address(mut self, address: &str, address_type: NodeAddressType) -> Self {
        self.status.addresses.push(NodeAddress {
            address: address.to_string(),
            address_type,
        });
        self
    }
}

impl HasMetadata for Node {
    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl HasStatus for Node {
    fn status_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(&self.status)?)
    }

    fn set_status_value(&mut self, value: Value) -> Result<()> {
        self.status = decode_status(value)?;
        Ok(())
    }
}

impl Resource for Node {
    const KIND: &'static str = "Node";
    const ROUTE: &'static str = "nodes";

    fn status_subresource(&mut self) -> Option<&mut dyn HasStatus> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_type_wire_names() {
        let node = Node::new("worker-1")
            .address("10.0.0.1", NodeAddressType::InternalIp)
            .address("worker-1", NodeAddressType::Hostname);
        let json = serde_json::to_value(&node).unwrap();

        assert_eq!(json["status"]["addresses"][0]["type"], "InternalIP");
        assert_eq!(json["status"]["addresses"][1]["type"], "Hostname");
        assert_eq!(json["apiVersion"], "v1");
    }

    #[test]
    fn test_decode_partial_node() {
        let node: Node = serde_json::from_str(r#"{"metadata":{"name":"worker-2"}}"#).unwrap();
        assert_eq!(node.metadata.name, "worker-2");
        assert!(node.status.addresses.is_empty());
    }
}
