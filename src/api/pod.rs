//! Pod resource

use super::{decode_status, FieldSelector, HasMetadata, HasStatus, ObjectMeta, Resource};
use crate::error::{Result, RudderError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field selector paths understood by pods
pub const POD_FIELDS: &[&str] = &["spec.nodeName", "metadata.name"];

/// A container in a pod spec
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Container {
    /// Image reference
    pub image: String,
    /// Container name, unique within the pod
    pub name: String,
}

impl Container {
    pub fn new(name: &str, image: &str) -> Self {
        Self {
            image: image.to_string(),
            name: name.to_string(),
        }
    }
}

/// Desired pod state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PodSpec {
    /// Containers, in declaration order
    pub containers: Vec<Container>,
    /// Assigned node; empty while unscheduled
    pub node_name: String,
}

/// Observed pod state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PodStatus {
    /// Pod IP, once networked
    pub pod_ip: Option<String>,
    /// Time the pod was started
    pub start_time: Option<DateTime<Utc>>,
}

/// A group of containers placed together on one node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Pod {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: PodSpec,
    pub status: PodStatus,
}

impl Pod {
    /// Create an unscheduled pod
    pub fn new(name: &str) -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: Self::KIND.to_string(),
            metadata: ObjectMeta::named(name),
            spec: PodSpec::default(),
            status: PodStatus::default(),
        }
    }

    /// Add a container
    pub fn container(mut self, name: &str, image: &str) -> Self {
        self.spec.containers.push(Container::new(name, image));
        self
    }

    /// Whether the pod still needs a node
    pub fn is_unscheduled(&self) -> bool {
        self.spec.node_name.is_empty()
    }

    /// Runtime name of one of this pod's containers
    pub fn container_id(&self, container: &Container) -> String {
        format!("{}-{}", self.metadata.name, container.name)
    }

    /// Partial pod that only assigns a node, for use with patch
    pub fn node_assignment(node_name: &str) -> Self {
        Self {
            spec: PodSpec {
                node_name: node_name.to_string(),
                ..PodSpec::default()
            },
            ..Self::default()
        }
    }
}

impl HasMetadata for Pod {
    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl HasStatus for Pod {
    fn status_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(&self.status)?)
    }

    fn set_status_value(&mut self, value: Value) -> Result<()> {
        self.status = decode_status(value)?;
        Ok(())
    }
}

impl Resource for Pod {
    const KIND: &'static str = "Pod";
    const ROUTE: &'static str = "pods";

    /// Pods filter on `spec.nodeName` and `metadata.name`. Any other field
    /// is rejected with `UnsupportedFilter` rather than matching nothing, so
    /// a typo in a selector is a 400 and not an empty list.
    fn check_field(field: &str) -> Result<()> {
        if POD_FIELDS.contains(&field) {
            Ok(())
        } else {
            Err(RudderError::UnsupportedFilter {
                kind: Self::KIND,
                field: field.to_string(),
            })
        }
    }

    fn matches_field(&self, selector: &FieldSelector) -> bool {
        match selector.field() {
            "spec.nodeName" => self.spec.node_name == selector.value(),
            "metadata.name" => self.metadata.name == selector.value(),
            _ => false,
        }
    }

    fn status_subresource(&mut self) -> Option<&mut dyn HasStatus> {
        Some(self)
    }
}
