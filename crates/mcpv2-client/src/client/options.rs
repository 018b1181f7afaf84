//! Per-call options, client state and statistics.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mcpv2_transport_traits::{TransportKind, TransportMetrics};
use serde::Serialize;
use serde_json::{Map, Value};

/// Options for one `invoke`, `send_request` or `stream` call.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeOptions {
    /// Attach the current context snapshot (default `true`)
    pub with_context: bool,

    /// Override the client's default timeout for this call
    pub timeout: Option<Duration>,

    /// Opaque signals forwarded as `metadata.learning_signals`
    pub learning_signals: Option<Map<String, Value>>,
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            with_context: true,
            timeout: None,
            learning_signals: None,
        }
    }
}

impl InvokeOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Send without a context snapshot
    #[must_use]
    pub fn without_context(mut self) -> Self {
        self.with_context = false;
        self
    }

    /// Bound this call by `timeout`
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add one learning signal
    #[must_use]
    pub fn with_learning_signal(mut self, key: impl Into<String>, value: Value) -> Self {
        self.learning_signals
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }
}

/// Lifecycle of a client.
///
/// ```text
/// Created ──connect──▶ Connecting ──ok──▶ Ready ──disconnect / connection lost──▶ Closing ──▶ Closed
///    ▲                     │
///    └──────failure────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientState {
    /// Built but not connected
    Created,
    /// `connect` in progress
    Connecting,
    /// Connected; calls are accepted
    Ready,
    /// Shutting the transport down
    Closing,
    /// Terminal; every call fails with `ClientClosed`
    Closed,
}

impl ClientState {
    /// Stable lowercase name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }

    /// Whether the client can never be used again
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time statistics for one client.
#[derive(Debug, Clone, Serialize)]
pub struct ClientStats {
    /// Transport in use
    pub transport: TransportKind,
    /// Lifecycle state
    pub state: ClientState,
    /// When the last successful `connect` finished
    pub connected_at: Option<DateTime<Utc>>,
    /// Calls handed to the transport (streams count once)
    pub requests_total: u64,
    /// Responses and stream items received
    pub responses_total: u64,
    /// Failed calls, including remote error payloads
    pub errors_total: u64,
    /// Calls and streams currently in flight
    pub pending_requests: usize,
    /// Turns currently held in the session context
    pub context_turns: usize,
    /// The transport's own counters
    pub transport_metrics: TransportMetrics,
}
