//! Shared object metadata

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// Metadata envelope carried by every resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectMeta {
    /// Server-assigned unique identifier
    pub uid: String,
    /// Object name, unique within its kind
    pub name: String,
    /// Free-form labels
    pub labels: BTreeSet<String>,
}

impl ObjectMeta {
    /// Create metadata with just a name
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Add a label
    pub fn label(mut self, label: &str) -> Self {
        self.labels.insert(label.to_string());
        self
    }
}

/// Label selector used by workload templates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LabelSelector {
    /// Labels that must all match
    pub match_labels: BTreeMap<String, String>,
}

/// Check that a name is usable as a registry key suffix.
///
/// Names follow DNS-1123 subdomain rules: lowercase alphanumerics, `-` and
/// `.`, starting and ending with an alphanumeric, at most 253 characters.
pub fn is_valid_name(name: &str) -> bool {
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    let re = NAME_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
            .expect("name pattern is valid")
    });
    name.len() <= 253 && re.is_match(name)
}

/// Metadata capability shared by every resource kind
pub trait HasMetadata {
    /// Borrow the metadata envelope
    fn metadata(&self) -> &ObjectMeta;

    /// Mutably borrow the metadata envelope
    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    /// Object name
    fn name(&self) -> &str {
        &self.metadata().name
    }

    /// Server-assigned identifier
    fn uid(&self) -> &str {
        &self.metadata().uid
    }

    /// Overwrite the identifier
    fn set_uid(&mut self, uid: String) {
        self.metadata_mut().uid = uid;
    }
}
