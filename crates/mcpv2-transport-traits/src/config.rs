//! Transport configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Largest single message accepted when nothing else is configured (16MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Configuration for request and response size limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum response body size in bytes.
    /// `None` = unlimited
    pub max_response_size: Option<usize>,

    /// Maximum request body size in bytes.
    /// `None` = unlimited
    pub max_request_size: Option<usize>,

    /// Whether `max_response_size` also applies to each streamed item.
    /// Unary responses are always checked.
    pub enforce_on_streams: bool,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_response_size: Some(10 * 1024 * 1024), // 10MB
            max_request_size: Some(1024 * 1024),       // 1MB
            enforce_on_streams: true,
        }
    }
}

impl LimitsConfig {
    /// Create a configuration with no limits.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_response_size: None,
            max_request_size: None,
            enforce_on_streams: false,
        }
    }

    /// Create a configuration with strict limits for untrusted servers.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            max_response_size: Some(1024 * 1024), // 1MB
            max_request_size: Some(256 * 1024),   // 256KB
            enforce_on_streams: true,
        }
    }
}

/// Connection and per-request timeouts applied inside a transport.
///
/// The client façade enforces its own per-call deadline on top of these; the
/// transport-level `request` timeout only bounds a single network exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Connection establishment timeout.
    pub connect: Duration,

    /// Single request timeout.
    /// `None` = no timeout
    pub request: Option<Duration>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            request: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_defaults() {
        let limits = LimitsConfig::default();
        assert_eq!(limits.max_request_size, Some(1024 * 1024));
        assert_eq!(limits.max_response_size, Some(10 * 1024 * 1024));
        assert!(LimitsConfig::unlimited().max_request_size.is_none());
    }

    #[test]
    fn test_limits_partial_deserialize() {
        let limits: LimitsConfig = serde_json::from_str(r#"{"max_request_size": 42}"#).unwrap();
        assert_eq!(limits.max_request_size, Some(42));
        assert_eq!(limits.max_response_size, Some(10 * 1024 * 1024));
    }

    #[test]
    fn test_timeout_defaults() {
        let timeouts = TimeoutConfig::default();
        assert_eq!(timeouts.connect, Duration::from_secs(10));
        assert!(timeouts.request.is_none());
    }

    #[test]
    fn test_stream_enforcement_defaults() {
        assert!(LimitsConfig::default().enforce_on_streams);
        assert!(LimitsConfig::strict().enforce_on_streams);
        assert!(!LimitsConfig::unlimited().enforce_on_streams);
    }
}
