//! Error types for Rudder

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for Rudder operations
pub type Result<T> = std::result::Result<T, RudderError>;

/// Rudder error types
#[derive(Error, Debug)]
pub enum RudderError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("fieldSelector must use format: foo.bar=baz (got {0:?})")]
    MalformedFilter(String),

    #[error("Field selector {field:?} is not supported for {kind}")]
    UnsupportedFilter { kind: &'static str, field: String },

    #[error("{0} has no status subresource")]
    UnsupportedStatus(&'static str),

    #[error("Invalid object: {0}")]
    InvalidObject(String),

    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RudderError {
    /// Shorthand for a missing object of the given kind
    pub fn not_found(kind: &'static str, name: &str) -> Self {
        RudderError::NotFound {
            kind,
            name: name.to_string(),
        }
    }

    /// Whether this error means the target object does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            RudderError::NotFound { .. } => true,
            RudderError::Api { status, .. } => *status == 404,
            _ => false,
        }
    }

    /// HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            RudderError::NotFound { .. } => StatusCode::NOT_FOUND,
            RudderError::Decode(_)
            | RudderError::MalformedFilter(_)
            | RudderError::UnsupportedFilter { .. }
            | RudderError::InvalidObject(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

impl IntoResponse for RudderError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            RudderError::not_found("Pod", "web").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            RudderError::MalformedFilter("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RudderError::UnsupportedStatus("Secret").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            RudderError::RegistryUnavailable("down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_remote_not_found() {
        let err = RudderError::Api {
            status: 404,
            message: "gone".into(),
        };
        assert!(err.is_not_found());
        assert!(!RudderError::Internal("x".into()).is_not_found());
    }
}
