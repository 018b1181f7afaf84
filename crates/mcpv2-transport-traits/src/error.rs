//! Transport error types.

use std::time::Duration;

use mcpv2_types::{ErrorKind, ErrorObject, McpError};
use thiserror::Error;

use crate::config::LimitsConfig;

/// A specialized `Result` type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Represents errors that can occur during transport operations.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum TransportError {
    /// Failed to establish a connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// An established connection was lost.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// The transport has not been opened.
    #[error("Not connected: {0}")]
    NotConnected(String),

    /// The transport was closed locally while the operation was pending.
    #[error("Transport closed")]
    Closed,

    /// The request cannot be sent as given (for example, its id is already in flight).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Failed to serialize an outgoing message.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// The peer sent something that does not follow the wire protocol.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Single request timed out.
    #[error("Request timed out after {timeout:?} for operation: {operation}")]
    RequestTimeout {
        /// The operation that timed out
        operation: String,
        /// The timeout duration that was exceeded
        timeout: Duration,
    },

    /// The transport was configured with invalid parameters.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The credential provider failed or the server rejected its credentials.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The operation is not available on this transport.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// The server reported a failure outside the response envelope
    /// (an HTTP status or a gRPC status code).
    #[error("Remote failure ({kind}): {message}")]
    Remote {
        /// Server-side classification
        kind: String,
        /// Human-readable message
        message: String,
        /// Numeric status, when available
        code: Option<i64>,
    },

    /// An underlying I/O error occurred.
    #[error("IO error: {0}")]
    Io(String),

    /// An unexpected internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Request size exceeds the configured maximum limit.
    #[error(
        "Request size ({size} bytes) exceeds maximum allowed ({max} bytes). \
         If this is expected, increase `LimitsConfig::max_request_size`"
    )]
    RequestTooLarge {
        /// The actual size of the request in bytes
        size: usize,
        /// The maximum allowed size in bytes
        max: usize,
    },

    /// Response size exceeds the configured maximum limit.
    #[error(
        "Response size ({size} bytes) exceeds maximum allowed ({max} bytes). \
         If this is expected, increase `LimitsConfig::max_response_size`"
    )]
    ResponseTooLarge {
        /// The actual size of the response in bytes
        size: usize,
        /// The maximum allowed size in bytes
        max: usize,
    },
}

impl TransportError {
    /// Whether this error means the connection is gone for good
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost(_) | Self::Io(_))
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationFailed(err.to_string())
    }
}

impl From<TransportError> for McpError {
    fn from(err: TransportError) -> Self {
        let message = err.to_string();
        let mapped = match err {
            TransportError::ConnectionFailed(_)
            | TransportError::NotConnected(_)
            | TransportError::ConfigurationError(_)
            | TransportError::AuthenticationFailed(_)
            | TransportError::Internal(_) => McpError::new(ErrorKind::Connection, message),
            TransportError::ConnectionLost(_) | TransportError::Io(_) => {
                McpError::new(ErrorKind::ConnectionLost, message)
            }
            TransportError::Closed => McpError::client_closed(),
            TransportError::RequestTimeout { .. } => McpError::new(ErrorKind::Timeout, message),
            TransportError::Unsupported(_) => {
                McpError::new(ErrorKind::UnsupportedOperation, message)
            }
            TransportError::InvalidRequest(_)
            | TransportError::SerializationFailed(_)
            | TransportError::RequestTooLarge { .. } => McpError::new(ErrorKind::Validation, message),
            TransportError::ProtocolError(_) | TransportError::ResponseTooLarge { .. } => {
                McpError::remote(ErrorObject::new("protocol_violation", message))
            }
            TransportError::Remote {
                kind,
                message,
                code,
            } => {
                let mut object = ErrorObject::new(kind, message);
                object.code = code;
                McpError::remote(object)
            }
        };
        mapped.with_component("transport")
    }
}

/// Validates that a request message size does not exceed the configured limit.
///
/// # Errors
///
/// Returns [`TransportError::RequestTooLarge`] when `size` is over the limit.
pub fn validate_request_size(size: usize, limits: &LimitsConfig) -> TransportResult<()> {
    if let Some(max_size) = limits.max_request_size
        && size > max_size
    {
        return Err(TransportError::RequestTooLarge {
            size,
            max: max_size,
        });
    }
    Ok(())
}

/// Validates that a response message size does not exceed the configured limit.
///
/// # Errors
///
/// Returns [`TransportError::ResponseTooLarge`] when `size` is over the limit.
pub fn validate_response_size(size: usize, limits: &LimitsConfig) -> TransportResult<()> {
    if let Some(max_size) = limits.max_response_size
        && size > max_size
    {
        return Err(TransportError::ResponseTooLarge {
            size,
            max: max_size,
        });
    }
    Ok(())
}
