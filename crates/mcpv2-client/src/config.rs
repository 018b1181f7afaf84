//! Client configuration.
//!
//! [`ClientOptions`] is the plain, serializable part: transport kind,
//! endpoint, timeouts and limits. It can be written in code, loaded from a
//! TOML/YAML/JSON file, and overridden by environment variables.
//! [`ClientConfig`] adds the pluggable collaborators (credentials, metrics
//! sink, logger) that cannot be expressed in a file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mcpv2_transport_traits::{CredentialProvider, LimitsConfig, TransportKind};
use mcpv2_types::{IdWindow, McpError, McpResult, PROTOCOL_VERSION};
use serde::{Deserialize, Serialize};

use crate::context::DEFAULT_MAX_TURNS;
use crate::observability::{Logger, Metrics, MetricsSink, TracingLogger};

/// Default environment variable prefix for [`ClientOptions::from_file`]
pub const DEFAULT_ENV_PREFIX: &str = "MCPV2";

/// Serializable client options.
///
/// Durations are written in milliseconds (`default_timeout_ms = 30000`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Which transport to build
    pub transport_kind: TransportKind,

    /// Transport endpoint (`http(s)://`, `ws(s)://`, or a gRPC URI)
    pub endpoint: String,

    /// Turns kept in the session context
    pub max_context_turns: usize,

    /// Per-call timeout when `InvokeOptions::timeout` is not set
    #[serde(rename = "default_timeout_ms", with = "duration_ms")]
    pub default_timeout: Duration,

    /// Bound on `Client::connect`
    #[serde(rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Duration,

    /// Identity sent as `metadata.client_id`; generated when absent
    pub client_id: Option<String>,

    /// Session id for the context; generated when absent
    pub session_id: Option<String>,

    /// Protocol version advertised to the server
    pub protocol_version: String,

    /// Static headers added to every HTTP request and the WebSocket handshake
    pub headers: HashMap<String, String>,

    /// Request/response size limits
    pub limits: LimitsConfig,

    /// HTTP path probed during `connect`; `None` skips the warmup
    pub health_check_path: Option<String>,

    /// WebSocket keep-alive ping interval; `None` disables pings
    #[serde(rename = "ping_interval_ms", with = "duration_ms::option")]
    pub ping_interval: Option<Duration>,

    /// Events buffered per subscriber
    pub event_capacity: usize,

    /// Recent request ids remembered for duplicate detection
    pub id_window: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            transport_kind: TransportKind::Http,
            endpoint: "http://localhost:8080/rpc".to_string(),
            max_context_turns: DEFAULT_MAX_TURNS,
            default_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            client_id: None,
            session_id: None,
            protocol_version: PROTOCOL_VERSION.to_string(),
            headers: HashMap::new(),
            limits: LimitsConfig::default(),
            health_check_path: None,
            ping_interval: Some(Duration::from_secs(30)),
            event_capacity: 256,
            id_window: IdWindow::DEFAULT_CAPACITY,
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// Options failed validation
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for McpError {
    fn from(err: ConfigError) -> Self {
        McpError::validation(err.to_string()).with_component("config")
    }
}

impl ClientOptions {
    /// Options for `kind` talking to `endpoint`, everything else default
    pub fn new(kind: TransportKind, endpoint: impl Into<String>) -> Self {
        Self {
            transport_kind: kind,
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Conservative settings for production traffic: strict size limits and
    /// a shorter default timeout.
    pub fn production(kind: TransportKind, endpoint: impl Into<String>) -> Self {
        Self {
            default_timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
            limits: LimitsConfig::strict(),
            ..Self::new(kind, endpoint)
        }
    }

    /// Forgiving settings for local development: long timeouts, no limits.
    pub fn development(kind: TransportKind, endpoint: impl Into<String>) -> Self {
        Self {
            default_timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(30),
            limits: LimitsConfig::unlimited(),
            max_context_turns: 200,
            ..Self::new(kind, endpoint)
        }
    }

    /// Load options from a file (TOML, YAML, or JSON)
    ///
    /// The file format is auto-detected from the file extension:
    /// - `.toml` → TOML format
    /// - `.yaml` or `.yml` → YAML format
    /// - `.json` → JSON format
    ///
    /// Environment variables prefixed with `MCPV2__` override file settings,
    /// with `__` separating nested keys (`MCPV2__LIMITS__MAX_REQUEST_SIZE`).
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use mcpv2_client::ClientOptions;
    ///
    /// let options = ClientOptions::from_file("client.toml").expect("Failed to load config");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file doesn't exist
    /// - The file format is unsupported
    /// - The file contains invalid options
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_prefix(path, DEFAULT_ENV_PREFIX)
    }

    /// Load options from a file with a custom environment prefix
    ///
    /// ```rust,no_run
    /// use mcpv2_client::ClientOptions;
    ///
    /// // Use MYAPP__ENDPOINT instead of MCPV2__ENDPOINT
    /// let options = ClientOptions::from_file_with_prefix("client.yaml", "MYAPP")
    ///     .expect("Failed to load config");
    /// ```
    pub fn from_file_with_prefix(
        path: impl AsRef<Path>,
        env_prefix: &str,
    ) -> Result<Self, ConfigError> {
        use config::{Config, File, FileFormat};

        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml" | "yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        let config = Config::builder()
            .add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ))
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let options: Self = config.try_deserialize()?;
        options.validate()?;
        Ok(options)
    }

    /// Check values that would make every call fail.
    ///
    /// Transport/operation mismatches (streaming over HTTP) are not checked
    /// here; they surface when the operation is attempted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint must not be empty".into()));
        }
        if self.max_context_turns == 0 {
            return Err(ConfigError::Invalid(
                "max_context_turns must be at least 1".into(),
            ));
        }
        if self.default_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "default_timeout must be greater than zero".into(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "connect_timeout must be greater than zero".into(),
            ));
        }
        if self.event_capacity == 0 || self.id_window == 0 {
            return Err(ConfigError::Invalid(
                "event_capacity and id_window must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Options plus the pluggable collaborators a client calls.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Serializable options
    pub options: ClientOptions,

    /// Supplies auth headers; `None` sends no credentials
    pub credential_provider: Option<Arc<dyn CredentialProvider>>,

    /// Receives latency and outcome per call
    pub metrics_sink: Arc<dyn MetricsSink>,

    /// Receives every client event
    pub logger: Arc<dyn Logger>,
}

impl ClientConfig {
    /// Wrap `options` with the default collaborators: no credentials, an
    /// in-memory [`Metrics`] sink and a [`TracingLogger`].
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            credential_provider: None,
            metrics_sink: Arc::new(Metrics::new()),
            logger: Arc::new(TracingLogger),
        }
    }

    /// Validate the options.
    ///
    /// # Errors
    ///
    /// Returns a validation error describing the first invalid option.
    pub fn validate(&self) -> McpResult<()> {
        self.options.validate().map_err(McpError::from)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(ClientOptions::default())
    }
}

/// Durations as integer milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }

    pub(super) mod option {
        use std::time::Duration;

        use serde::{Deserialize, Deserializer, Serializer};

        pub(in crate::config) fn serialize<S: Serializer>(
            value: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
                None => serializer.serialize_none(),
            }
        }

        pub(in crate::config) fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let options = ClientOptions::default();
        assert_eq!(options.max_context_turns, 50);
        assert_eq!(options.default_timeout, Duration::from_secs(30));
        assert_eq!(options.connect_timeout, Duration::from_secs(10));
        assert_eq!(options.protocol_version, "2.0");
        assert_eq!(options.event_capacity, 256);
        assert_eq!(options.id_window, 1024);
        options.validate().unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let options: ClientOptions = serde_json::from_value(json!({
            "transport_kind": "websocket",
            "endpoint": "ws://127.0.0.1:9000",
            "default_timeout_ms": 500,
            "ping_interval_ms": null
        }))
        .unwrap();
        assert_eq!(options.transport_kind, TransportKind::WebSocket);
        assert_eq!(options.default_timeout, Duration::from_millis(500));
        assert_eq!(options.ping_interval, None);
        assert_eq!(options.max_context_turns, 50);
    }

    #[test]
    fn test_serialized_durations_are_millis() {
        let value = serde_json::to_value(ClientOptions::default()).unwrap();
        assert_eq!(value["default_timeout_ms"], 30_000);
        assert_eq!(value["ping_interval_ms"], 30_000);
        assert_eq!(value["transport_kind"], "http");
    }

    #[test]
    fn test_presets() {
        let prod = ClientOptions::production(TransportKind::Grpc, "http://[::1]:50051");
        assert_eq!(prod.limits, LimitsConfig::strict());
        assert!(prod.default_timeout < ClientOptions::default().default_timeout);

        let dev = ClientOptions::development(TransportKind::Http, "http://localhost:8080/rpc");
        assert_eq!(dev.limits, LimitsConfig::unlimited());
        assert_eq!(dev.max_context_turns, 200);
    }

    #[test]
    fn test_validation() {
        let mut options = ClientOptions::default();
        options.max_context_turns = 0;
        assert!(matches!(options.validate(), Err(ConfigError::Invalid(_))));

        let mut options = ClientOptions::default();
        options.endpoint = "  ".into();
        let err: McpError = options.validate().unwrap_err().into();
        assert_eq!(err.kind, mcpv2_types::ErrorKind::Validation);
    }
}
