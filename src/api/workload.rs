//! Replicated workload resources
//!
//! Deployments and replica sets are stored and served like any other kind.
//! Nothing reconciles them into pods yet.

use super::{decode_status, HasMetadata, HasStatus, LabelSelector, ObjectMeta, PodSpec, Resource};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Template for pods produced by a workload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PodTemplate {
    pub metadata: ObjectMeta,
    pub spec: PodSpec,
}

/// Desired workload state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadSpec {
    /// Desired number of pods
    pub replicas: u32,
    /// Selector the produced pods must match
    pub selector: LabelSelector,
    /// Pod template
    pub template: PodTemplate,
}

/// Observed workload state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadStatus {
    /// Observed number of pods
    pub replicas: u32,
}

/// Declarative rollout of a replicated pod template
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Deployment {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: WorkloadSpec,
    pub status: WorkloadStatus,
}

/// Fixed-size set of identical pods
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReplicaSet {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: WorkloadSpec,
    pub status: WorkloadStatus,
}

impl HasMetadata for Deployment {
    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl HasStatus for Deployment {
    fn status_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(&self.status)?)
    }

    fn set_status_value(&mut self, value: Value) -> Result<()> {
        self.status = decode_status(value)?;
        Ok(())
    }
}

impl Resource for Deployment {
    const KIND: &'static str = "Deployment";
    const ROUTE: &'static str = "deployments";

    fn status_subresource(&mut self) -> Option<&mut dyn HasStatus> {
        Some(self)
    }
}

impl HasMetadata for ReplicaSet {
    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl HasStatus for ReplicaSet {
    fn status_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(&self.status)?)
    }

    fn set_status_value(&mut self, value: Value) -> Result<()> {
        self.status = decode_status(value)?;
        Ok(())
    }
}

impl Resource for ReplicaSet {
    const KIND: &'static str = "ReplicaSet";
    const ROUTE: &'static str = "replicasets";

    fn status_subresource(&mut self) -> Option<&mut dyn HasStatus> {
        Some(self)
    }
}
