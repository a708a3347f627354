//! Field selectors

use crate::error::{Result, RudderError};
use std::fmt;

/// A single equality predicate of the form `path.to.field=value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelector {
    field: String,
    value: String,
}

impl FieldSelector {
    /// Build a selector from its parts
    pub fn new(field: &str, value: &str) -> Self {
        Self {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    /// Parse a raw query value.
    ///
    /// An empty string means "no selector". Otherwise the string must split
    /// on `=` into exactly two parts with a non-empty field path; the value
    /// may be empty (`spec.nodeName=` selects unscheduled pods).
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        if raw.is_empty() {
            return Ok(None);
        }

        let parts: Vec<&str> = raw.split('=').collect();
        match parts.as_slice() {
            [field, value] if !field.trim().is_empty() => Ok(Some(Self::new(field.trim(), value))),
            _ => Err(RudderError::MalformedFilter(raw.to_string())),
        }
    }

    /// Field path
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Expected value
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.field, self.value)
    }
}
