//! Orchestrated resource kinds
//!
//! Every kind shares the [`ObjectMeta`] envelope and implements [`Resource`],
//! which tells the generic object store where the kind lives in the registry,
//! which field selectors it understands and whether it has a status
//! subresource.

pub mod meta;
pub mod node;
pub mod pod;
pub mod selector;
pub mod workload;

pub use meta::{is_valid_name, HasMetadata, LabelSelector, ObjectMeta};
pub use node::{Node, NodeAddress, NodeAddressType, NodeStatus};
pub use pod::{Container, Pod, PodSpec, PodStatus};
pub use selector::FieldSelector;
pub use workload::{Deployment, PodTemplate, ReplicaSet, WorkloadSpec, WorkloadStatus};

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Default registry prefix
pub const REGISTRY_PREFIX: &str = "/registry";

/// Status capability: read and replace a kind's status as structured JSON
pub trait HasStatus {
    /// Current status as a JSON value
    fn status_value(&self) -> Result<Value>;

    /// Replace the status from a JSON value
    fn set_status_value(&mut self, value: Value) -> Result<()>;
}

/// A resource kind served by the object store
pub trait Resource:
    HasMetadata + Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
    /// Kind name, e.g. `Pod`
    const KIND: &'static str;

    /// Route segment, e.g. `pods`
    const ROUTE: &'static str;

    /// Validate a selector field before any object is inspected.
    ///
    /// Kinds without filtering ignore selectors.
    fn check_field(field: &str) -> Result<()> {
        let _ = field;
        Ok(())
    }

    /// Whether this object satisfies an accepted selector
    fn matches_field(&self, selector: &FieldSelector) -> bool {
        let _ = selector;
        true
    }

    /// Status subresource, if the kind has one
    fn status_subresource(&mut self) -> Option<&mut dyn HasStatus> {
        None
    }
}

/// Decode a status value into a concrete status type
pub(crate) fn decode_status<S: DeserializeOwned>(value: Value) -> Result<S> {
    serde_json::from_value(value).map_err(|e| crate::error::RudderError::Decode(e.to_string()))
}
