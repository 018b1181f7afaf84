//! Configuration for the WebSocket transport.

use std::collections::HashMap;
use std::time::Duration;

use mcpv2_transport_traits::{LimitsConfig, TimeoutConfig};

/// Default keep-alive ping interval.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket transport configuration
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// `ws://` or `wss://` URL
    pub url: String,

    /// Handshake and per-request timeouts
    pub timeouts: TimeoutConfig,

    /// Interval between keep-alive pings; `None` disables them
    pub ping_interval: Option<Duration>,

    /// Frame size limits
    pub limits: LimitsConfig,

    /// Extra headers sent with the opening handshake
    pub headers: HashMap<String, String>,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080".to_string(),
            timeouts: TimeoutConfig::default(),
            ping_interval: Some(DEFAULT_PING_INTERVAL),
            limits: LimitsConfig::default(),
            headers: HashMap::new(),
        }
    }
}

impl WebSocketConfig {
    /// Create a configuration for `url` with defaults for everything else
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the keep-alive interval
    #[must_use]
    pub fn with_ping_interval(mut self, interval: Option<Duration>) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set the handshake timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connect = timeout;
        self
    }

    /// Add a handshake header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}
