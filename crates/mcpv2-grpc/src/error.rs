//! Error types for the gRPC transport
//!
//! Maps tonic failures and gRPC status codes onto [`TransportError`].

use std::time::Duration;

use mcpv2_transport_traits::TransportError;
use thiserror::Error;
use tonic::{Code, Status};

/// Result type for gRPC operations
pub type GrpcResult<T> = Result<T, GrpcError>;

/// Error type for gRPC transport operations
#[derive(Debug, Error)]
pub enum GrpcError {
    /// Channel could not be established
    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The server answered with a non-OK status
    #[error("gRPC status error: {0}")]
    Status(#[from] Status),

    /// An outgoing payload could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An incoming message could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// The request cannot be expressed on the wire
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GrpcError {
    /// Create a decode error
    #[must_use]
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<serde_json::Error> for GrpcError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<GrpcError> for TransportError {
    fn from(err: GrpcError) -> Self {
        match err {
            GrpcError::Transport(e) => TransportError::ConnectionFailed(e.to_string()),
            GrpcError::Status(status) => status_to_transport_error(&status, Duration::ZERO),
            GrpcError::Serialization(msg) => TransportError::SerializationFailed(msg),
            GrpcError::Decode(msg) => TransportError::ProtocolError(msg),
            GrpcError::InvalidRequest(msg) => TransportError::InvalidRequest(msg),
            GrpcError::Config(msg) => TransportError::ConfigurationError(msg),
        }
    }
}

/// Snake-case name of a status code, used as the remote error kind
#[must_use]
pub fn code_name(code: Code) -> &'static str {
    match code {
        Code::Ok => "ok",
        Code::Cancelled => "cancelled",
        Code::InvalidArgument => "invalid_argument",
        Code::DeadlineExceeded => "deadline_exceeded",
        Code::NotFound => "not_found",
        Code::AlreadyExists => "already_exists",
        Code::PermissionDenied => "permission_denied",
        Code::ResourceExhausted => "resource_exhausted",
        Code::FailedPrecondition => "failed_precondition",
        Code::Aborted => "aborted",
        Code::OutOfRange => "out_of_range",
        Code::Unimplemented => "unimplemented",
        Code::Internal => "internal",
        Code::Unavailable => "unavailable",
        Code::DataLoss => "data_loss",
        Code::Unauthenticated => "unauthenticated",
        _ => "unknown",
    }
}

/// Convert a gRPC status into the shared transport taxonomy.
///
/// `timeout` is reported on `DeadlineExceeded`.
#[must_use]
pub fn status_to_transport_error(status: &Status, timeout: Duration) -> TransportError {
    let message = status.message().to_string();
    match status.code() {
        Code::Unavailable | Code::Aborted => TransportError::ConnectionLost(message),
        Code::DeadlineExceeded => TransportError::RequestTimeout {
            operation: format!("grpc call: {message}"),
            timeout,
        },
        Code::Unimplemented => TransportError::Unsupported(message),
        code => TransportError::Remote {
            kind: code_name(code).to_string(),
            message,
            code: Some(i64::from(i32::from(code))),
        },
    }
}
