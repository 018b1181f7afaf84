//! Client lifecycle events.

use std::sync::Arc;

use mcpv2_transport_traits::TransportKind;
use mcpv2_types::{ErrorKind, RequestId};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::observability::Logger;

/// Something observable that happened inside a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    /// The transport finished opening.
    ConnectionOpened {
        /// Transport in use
        transport: TransportKind,
        /// Remote endpoint
        endpoint: String,
    },

    /// The client was disconnected by the caller.
    ConnectionClosed {
        /// Transport in use
        transport: TransportKind,
        /// Remote endpoint
        endpoint: String,
    },

    /// The transport died mid-session.
    ConnectionLost {
        /// Transport in use
        transport: TransportKind,
        /// Failure description
        reason: String,
    },

    /// A request was handed to the transport.
    RequestSent {
        /// Request id
        request_id: RequestId,
        /// Method invoked
        method: String,
        /// Whether a context snapshot was attached
        with_context: bool,
    },

    /// A response (or stream item) arrived.
    ResponseReceived {
        /// Correlated request id
        request_id: RequestId,
        /// Method invoked
        method: String,
        /// Time from send to arrival, in milliseconds
        latency_ms: u64,
        /// Whether the payload was an error object
        is_error: bool,
    },

    /// A call failed.
    ErrorOccurred {
        /// Request id, when the failure belongs to a request
        request_id: Option<RequestId>,
        /// Method, when the failure belongs to a request
        method: Option<String>,
        /// Error classification
        kind: ErrorKind,
        /// Error message
        message: String,
    },

    /// A turn was recorded in the session context.
    ContextUpdated {
        /// Session the turn belongs to
        session_id: String,
        /// Number of turns now held
        turns: usize,
    },

    /// A stream was cancelled before its end-of-stream signal.
    StreamCancelled {
        /// Streaming request id
        request_id: RequestId,
    },

    /// A response broke the envelope rules.
    ProtocolViolation {
        /// Offending response id
        request_id: RequestId,
        /// What was wrong
        detail: String,
    },
}

impl ClientEvent {
    /// Stable snake-case event name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ConnectionOpened { .. } => "connection_opened",
            Self::ConnectionClosed { .. } => "connection_closed",
            Self::ConnectionLost { .. } => "connection_lost",
            Self::RequestSent { .. } => "request_sent",
            Self::ResponseReceived { .. } => "response_received",
            Self::ErrorOccurred { .. } => "error_occurred",
            Self::ContextUpdated { .. } => "context_updated",
            Self::StreamCancelled { .. } => "stream_cancelled",
            Self::ProtocolViolation { .. } => "protocol_violation",
        }
    }
}

/// Delivers events to the configured [`Logger`] and to every subscriber.
///
/// Subscribers that fall behind by more than the channel capacity miss the
/// oldest events (`RecvError::Lagged`); emission never blocks.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ClientEvent>,
    logger: Arc<dyn Logger>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize, logger: Arc<dyn Logger>) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender, logger }
    }

    /// A new receiver of subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Log and broadcast an event.
    pub fn emit(&self, event: ClientEvent) {
        self.logger.log(&event);
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Emits a `RequestSent` event.
    pub fn emit_request_sent(&self, request_id: &RequestId, method: &str, with_context: bool) {
        self.emit(ClientEvent::RequestSent {
            request_id: request_id.clone(),
            method: method.to_string(),
            with_context,
        });
    }

    /// Emits a `ProtocolViolation` event.
    pub fn emit_protocol_violation(&self, request_id: &RequestId, detail: &str) {
        self.emit(ClientEvent::ProtocolViolation {
            request_id: request_id.clone(),
            detail: detail.to_string(),
        });
    }
}
