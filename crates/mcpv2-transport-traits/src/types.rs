//! Core transport types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// The wire protocols a client can speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// One HTTP POST per request, JSON-RPC style.
    Http,
    /// Multiplexed JSON frames over a single WebSocket.
    #[serde(alias = "ws")]
    WebSocket,
    /// Unary and server-streaming RPCs over an HTTP/2 channel.
    Grpc,
}

impl TransportKind {
    /// Stable lowercase name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::WebSocket => "websocket",
            Self::Grpc => "grpc",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "websocket" | "ws" => Ok(Self::WebSocket),
            "grpc" => Ok(Self::Grpc),
            other => Err(TransportError::ConfigurationError(format!(
                "unknown transport kind '{other}' (expected http, websocket or grpc)"
            ))),
        }
    }
}

/// Represents the current state of a transport connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportState {
    /// The transport is not connected.
    Disconnected,
    /// The transport is in the process of connecting.
    Connecting,
    /// The transport is connected and ready to send requests.
    Connected,
    /// The transport is in the process of disconnecting.
    Disconnecting,
    /// The connection died; the transport will not recover on its own.
    Failed {
        /// A description of the failure reason.
        reason: String,
    },
}

impl TransportState {
    /// Whether requests may be sent
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnecting => write!(f, "disconnecting"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Describes what a transport implementation can do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportCapabilities {
    /// The maximum message size in bytes that the transport accepts.
    pub max_message_size: Option<usize>,

    /// Whether `send_stream` is supported.
    pub supports_streaming: bool,

    /// Whether `cancel` reaches the server.
    pub supports_cancellation: bool,

    /// Whether several requests can be in flight on one connection.
    pub supports_multiplexing: bool,
}

impl Default for TransportCapabilities {
    fn default() -> Self {
        Self {
            max_message_size: Some(crate::config::DEFAULT_MAX_MESSAGE_SIZE),
            supports_streaming: false,
            supports_cancellation: false,
            supports_multiplexing: false,
        }
    }
}

impl TransportCapabilities {
    /// Capabilities of a request/response-only transport
    pub fn unary() -> Self {
        Self::default()
    }

    /// Capabilities of a multiplexed streaming transport
    pub fn streaming() -> Self {
        Self {
            supports_streaming: true,
            supports_cancellation: true,
            supports_multiplexing: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_kind_display() {
        assert_eq!(TransportKind::Http.to_string(), "http");
        assert_eq!(TransportKind::WebSocket.to_string(), "websocket");
        assert_eq!(TransportKind::Grpc.to_string(), "grpc");
    }

    #[test]
    fn test_transport_kind_parse() {
        assert_eq!("HTTP".parse::<TransportKind>().unwrap(), TransportKind::Http);
        assert_eq!("ws".parse::<TransportKind>().unwrap(), TransportKind::WebSocket);
        assert_eq!(" grpc ".parse::<TransportKind>().unwrap(), TransportKind::Grpc);
        assert!("smtp".parse::<TransportKind>().is_err());
    }

    #[test]
    fn test_transport_kind_serde() {
        let kind: TransportKind = serde_json::from_str("\"websocket\"").unwrap();
        assert_eq!(kind, TransportKind::WebSocket);
        assert_eq!(serde_json::to_string(&TransportKind::Grpc).unwrap(), "\"grpc\"");
    }

    #[test]
    fn test_transport_state_display() {
        assert_eq!(TransportState::Connected.to_string(), "connected");
        assert_eq!(
            TransportState::Failed {
                reason: "reset".into()
            }
            .to_string(),
            "failed: reset"
        );
        assert!(TransportState::Connected.is_connected());
        assert!(!TransportState::Disconnected.is_connected());
    }

    #[test]
    fn test_capabilities_presets() {
        assert!(!TransportCapabilities::unary().supports_streaming);
        let streaming = TransportCapabilities::streaming();
        assert!(streaming.supports_streaming);
        assert!(streaming.supports_cancellation);
    }
}
