//! Unified client error handling.
//!
//! Every failure surfaced by the client is an [`McpError`]. The [`ErrorKind`]
//! gives callers a stable, programmatic classification; the message is meant
//! for humans.
//!
//! ```rust
//! use mcpv2_types::{ErrorKind, McpError};
//!
//! let err = McpError::validation("method must not be empty");
//! assert_eq!(err.kind, ErrorKind::Validation);
//! assert_eq!(err.kind.as_str(), "validation_error");
//! assert!(!err.is_retryable());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::response::ErrorObject;

/// Result type alias for client operations
pub type McpResult<T> = std::result::Result<T, McpError>;

/// Unified client error type
///
/// The `remote` and `context` fields are boxed to keep `Result<T, McpError>` small.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub struct McpError {
    /// Error classification
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The server's error object when `kind` is [`ErrorKind::Remote`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<Box<ErrorObject>>,
    /// Additional context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Box<ErrorContext>>,
}

/// Additional error context
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Operation being performed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Component where error occurred
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    /// Request ID for tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error classification for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed request rejected before any network I/O
    #[serde(rename = "validation_error")]
    Validation,
    /// The transport failed to open
    #[serde(rename = "connection_error")]
    Connection,
    /// An open transport died mid-session
    #[serde(rename = "connection_lost_error")]
    ConnectionLost,
    /// No response within the configured window
    #[serde(rename = "timeout_error")]
    Timeout,
    /// Operation not supported by the selected transport
    #[serde(rename = "unsupported_operation_error")]
    UnsupportedOperation,
    /// The server answered with an error object
    #[serde(rename = "remote_error")]
    Remote,
    /// Call attempted after `disconnect()`
    #[serde(rename = "client_closed_error")]
    ClientClosed,
}

impl McpError {
    /// Create a new error with kind and message
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            remote: None,
            context: None,
        }
    }

    /// Create a validation error
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a connection error
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    /// Create a connection-lost error
    #[must_use]
    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionLost, message)
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Create an unsupported-operation error
    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedOperation, message)
    }

    /// Create a client-closed error
    #[must_use]
    pub fn client_closed() -> Self {
        Self::new(ErrorKind::ClientClosed, "client has been disconnected")
    }

    /// Wrap an error object returned by the server
    #[must_use]
    pub fn remote(error: ErrorObject) -> Self {
        let message = format!("{}: {}", error.kind, error.message);
        Self {
            kind: ErrorKind::Remote,
            message,
            remote: Some(Box::new(error)),
            context: None,
        }
    }

    /// Set the operation context
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(Box::default);
        ctx.operation = Some(operation.into());
        self
    }

    /// Set the component context
    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(Box::default);
        ctx.component = Some(component.into());
        self
    }

    /// Set the request ID context
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(Box::default);
        ctx.request_id = Some(request_id.into());
        self
    }

    /// The server-reported error kind, when this is a remote error
    #[must_use]
    pub fn remote_kind(&self) -> Option<&str> {
        self.remote.as_deref().map(|e| e.kind.as_str())
    }

    /// Check if this error is retryable
    ///
    /// Only connection and timeout failures qualify. Validation, unsupported
    /// and remote errors are final.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Stable numeric code for this error
    #[must_use]
    pub fn code(&self) -> i64 {
        match (&self.kind, self.remote.as_deref()) {
            (ErrorKind::Remote, Some(ErrorObject { code: Some(code), .. })) => *code,
            (kind, _) => kind.code(),
        }
    }
}

impl fmt::Display for McpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl ErrorKind {
    /// Stable kind string
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::Connection => "connection_error",
            Self::ConnectionLost => "connection_lost_error",
            Self::Timeout => "timeout_error",
            Self::UnsupportedOperation => "unsupported_operation_error",
            Self::Remote => "remote_error",
            Self::ClientClosed => "client_closed_error",
        }
    }

    /// Numeric code for this kind
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Validation => -32422,
            Self::Connection => -32200,
            Self::ConnectionLost => -32201,
            Self::Timeout => -32202,
            Self::ClientClosed => -32203,
            Self::UnsupportedOperation => -32601,
            Self::Remote => -32603,
        }
    }

    /// Whether a caller may reasonably retry an operation that failed this way
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Connection | Self::ConnectionLost | Self::Timeout)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        Self::validation(format!("serialization failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kind_strings_are_stable() {
        assert_eq!(ErrorKind::Validation.as_str(), "validation_error");
        assert_eq!(ErrorKind::ConnectionLost.as_str(), "connection_lost_error");
        assert_eq!(ErrorKind::ClientClosed.to_string(), "client_closed_error");

        let json = serde_json::to_value(ErrorKind::UnsupportedOperation).unwrap();
        assert_eq!(json, serde_json::json!("unsupported_operation_error"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(McpError::connection("refused").is_retryable());
        assert!(McpError::connection_lost("reset").is_retryable());
        assert!(McpError::timeout("slow").is_retryable());
        assert!(!McpError::validation("bad").is_retryable());
        assert!(!McpError::unsupported("stream").is_retryable());
        assert!(!McpError::client_closed().is_retryable());
        assert!(!McpError::remote(ErrorObject::new("busy", "try later")).is_retryable());
    }

    #[test]
    fn test_remote_error_wraps_server_object() {
        let err = McpError::remote(ErrorObject::new("not_found", "no such tool").with_code(-32404));
        assert_eq!(err.kind, ErrorKind::Remote);
        assert_eq!(err.remote_kind(), Some("not_found"));
        assert_eq!(err.code(), -32404);
        assert_eq!(err.message, "not_found: no such tool");
    }

    #[test]
    fn test_context_builders() {
        let err = McpError::timeout("no answer")
            .with_operation("invoke")
            .with_request_id("abc-1")
            .with_component("client");
        let ctx = err.context.as_deref().unwrap();
        assert_eq!(ctx.operation.as_deref(), Some("invoke"));
        assert_eq!(ctx.request_id.as_deref(), Some("abc-1"));
        assert_eq!(ctx.component.as_deref(), Some("client"));
        assert_eq!(err.code(), -32202);
    }
}
