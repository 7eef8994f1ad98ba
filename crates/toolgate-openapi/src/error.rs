//! Error types for OpenAPI tool generation and execution.
//!
//! Startup errors (`OpenApiError`, `SpecError`) abort registration. Per-call
//! errors (`ArgumentError`, `SelectionError`, `TransportError`) never leave a
//! tool call as `Err`; they are folded into an error envelope instead.

use crate::types::HttpMethod;
use thiserror::Error;
use toolgate_core::{ErrorBody, ErrorCode};

/// Result type for OpenAPI operations.
pub type Result<T> = std::result::Result<T, OpenApiError>;

/// Errors that can occur while loading a spec and building a registry.
#[derive(Error, Debug)]
pub enum OpenApiError {
    /// OpenAPI spec parsing error
    #[error("Failed to parse OpenAPI spec: {0}")]
    ParseError(String),

    /// Structural defect in the spec
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// Two tools would share one name
    #[error("Duplicate tool name '{0}'")]
    DuplicateToolName(String),

    /// Invalid include/exclude pattern
    #[error("Invalid operation filter pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// HTTP request error while fetching a spec
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Defects found while walking the spec document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("Operation {method} {path} has no operationId")]
    MissingOperationId { method: HttpMethod, path: String },

    #[error("operationId '{0}' is used by more than one operation")]
    DuplicateOperationId(String),

    #[error("Operation '{operation_id}' uses path placeholder '{{{name}}}' without declaring a path parameter")]
    UndeclaredPathParameter { operation_id: String, name: String },

    #[error("Malformed parameter '{name}' in operation '{operation_id}': {reason}")]
    MalformedParameter {
        operation_id: String,
        name: String,
        reason: String,
    },

    #[error("Unresolved reference '{0}'")]
    UnresolvedReference(String),
}

/// Arguments rejected before any request is built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("Arguments must be a JSON object")]
    NotAnObject,

    #[error("Missing required path parameter '{0}'")]
    MissingPathParameter(String),

    #[error("Missing required argument '{0}'")]
    MissingRequired(String),

    #[error("Argument '{name}' must be of type {expected}, got {found}")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("Argument '{name}' must be one of {allowed}")]
    NotInEnum { name: String, allowed: String },

    #[error("Argument '{name}' cannot be sent as a header or cookie: {reason}")]
    InvalidHeaderValue { name: String, reason: String },
}

impl ArgumentError {
    pub fn to_error_body(&self) -> ErrorBody {
        let code = match self {
            ArgumentError::MissingPathParameter(_) => ErrorCode::MissingPathParameter,
            _ => ErrorCode::InvalidArgument,
        };
        ErrorBody::new(code, self.to_string())
            .with_suggestion("Call the describe tool to see the accepted arguments for this tool.")
    }
}

/// No usable base URL for a call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("No server available: the spec declares no servers and no base URL override is configured")]
    NoServers,

    #[error("No server available: server URL '{0}' is relative; configure a base URL override")]
    RelativeServer(String),
}

impl SelectionError {
    pub fn to_error_body(&self) -> ErrorBody {
        ErrorBody::new(ErrorCode::NoServerAvailable, self.to_string())
            .with_suggestion("Set a base URL override (OPENAPI_BASE_URL or --base-url).")
    }
}

/// Classification of transport-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    InvalidRequest,
    Body,
    Other,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Connect => write!(f, "connect"),
            TransportErrorKind::InvalidRequest => write!(f, "invalid request"),
            TransportErrorKind::Body => write!(f, "body"),
            TransportErrorKind::Other => write!(f, "other"),
        }
    }
}

/// The request never produced an HTTP response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn to_error_body(&self) -> ErrorBody {
        let body = ErrorBody::new(ErrorCode::NetworkError, self.to_string());
        match self.kind {
            TransportErrorKind::Timeout => {
                body.with_suggestion("The upstream did not answer in time; the request was not retried.")
            }
            TransportErrorKind::Connect => {
                body.with_suggestion("Check that the upstream base URL is reachable.")
            }
            _ => body,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_builder() {
            TransportErrorKind::InvalidRequest
        } else if err.is_body() || err.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Other
        };
        TransportError::new(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_path_parameter_has_its_own_code() {
        let body = ArgumentError::MissingPathParameter("id".to_string()).to_error_body();
        assert_eq!(body.code, ErrorCode::MissingPathParameter);
        assert!(body.message.contains("'id'"));

        let body = ArgumentError::MissingRequired("limit".to_string()).to_error_body();
        assert_eq!(body.code, ErrorCode::InvalidArgument);
        assert!(!body.suggestions.is_empty());
    }

    #[test]
    fn test_transport_error_has_no_status() {
        let body = TransportError::new(TransportErrorKind::Timeout, "deadline elapsed").to_error_body();
        assert_eq!(body.code, ErrorCode::NetworkError);
        assert_eq!(body.http_status, None);
        assert!(body.message.starts_with("timeout error"));
    }
}
