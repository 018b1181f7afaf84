//! Client builder pattern for client construction
//!
//! Provides a fluent interface for configuring client options before creation.

use std::sync::Arc;
use std::time::Duration;

use mcpv2_transport_traits::{CredentialProvider, LimitsConfig, Transport, TransportKind};
use mcpv2_types::McpResult;

use super::core::Client;
use crate::config::{ClientConfig, ClientOptions};
use crate::factory;
use crate::observability::{Logger, MetricsSink};

/// Builder for configuring and creating clients
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use mcpv2_client::{ClientBuilder, MetricsFacade};
/// use mcpv2_transport_traits::StaticCredentials;
///
/// # async fn example() -> mcpv2_types::McpResult<()> {
/// let client = ClientBuilder::websocket("wss://orchestrator.example.com/mcp")
///     .with_timeout(Duration::from_secs(10))
///     .with_max_context_turns(20)
///     .with_credentials(Arc::new(StaticCredentials::bearer("token")))
///     .with_metrics_sink(Arc::new(MetricsFacade::new()))
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ClientBuilder {
    options: ClientOptions,
    credential_provider: Option<Arc<dyn CredentialProvider>>,
    metrics_sink: Option<Arc<dyn MetricsSink>>,
    logger: Option<Arc<dyn Logger>>,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    /// Create a new client builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing options, e.g. loaded with [`ClientOptions::from_file`].
    pub fn from_options(options: ClientOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// HTTP JSON-RPC client for `endpoint`
    pub fn http(endpoint: impl Into<String>) -> Self {
        Self::from_options(ClientOptions::new(TransportKind::Http, endpoint))
    }

    /// WebSocket client for `url`
    pub fn websocket(url: impl Into<String>) -> Self {
        Self::from_options(ClientOptions::new(TransportKind::WebSocket, url))
    }

    /// gRPC client for `endpoint`
    pub fn grpc(endpoint: impl Into<String>) -> Self {
        Self::from_options(ClientOptions::new(TransportKind::Grpc, endpoint))
    }

    // ============================================================================
    // TRANSPORT
    // ============================================================================

    /// Select the transport
    pub fn with_transport_kind(mut self, kind: TransportKind) -> Self {
        self.options.transport_kind = kind;
        self
    }

    /// Set the endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.options.endpoint = endpoint.into();
        self
    }

    /// Use a pre-built transport instead of building one from the options.
    ///
    /// Transport-specific options and the credential provider are ignored.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Add a static header to every HTTP request and the WebSocket handshake
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.headers.insert(name.into(), value.into());
        self
    }

    /// Set request/response size limits
    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.options.limits = limits;
        self
    }

    /// Probe `path` with a GET during `connect` (HTTP only)
    pub fn with_health_check_path(mut self, path: impl Into<String>) -> Self {
        self.options.health_check_path = Some(path.into());
        self
    }

    /// Set the WebSocket keep-alive interval; `None` disables pings
    pub fn with_ping_interval(mut self, interval: Option<Duration>) -> Self {
        self.options.ping_interval = interval;
        self
    }

    // ============================================================================
    // CALL BEHAVIOR
    // ============================================================================

    /// Default per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.default_timeout = timeout;
        self
    }

    /// Bound on `connect`
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Turns kept in the session context
    pub fn with_max_context_turns(mut self, max_turns: usize) -> Self {
        self.options.max_context_turns = max_turns;
        self
    }

    /// Fixed client identity
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.options.client_id = Some(client_id.into());
        self
    }

    /// Fixed session id
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.options.session_id = Some(session_id.into());
        self
    }

    /// Events buffered per subscriber
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.options.event_capacity = capacity;
        self
    }

    /// Recent request ids remembered for duplicate detection
    pub fn with_id_window(mut self, size: usize) -> Self {
        self.options.id_window = size;
        self
    }

    // ============================================================================
    // COLLABORATORS
    // ============================================================================

    /// Credential provider consulted by the transport
    pub fn with_credentials(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credential_provider = Some(provider);
        self
    }

    /// Metrics sink (defaults to an in-memory [`Metrics`](crate::Metrics))
    pub fn with_metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics_sink = Some(sink);
        self
    }

    /// Event logger (defaults to [`TracingLogger`](crate::TracingLogger))
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    // ============================================================================
    // BUILD
    // ============================================================================

    /// The configuration this builder describes
    pub fn build_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.options.clone());
        config.credential_provider = self.credential_provider.clone();
        if let Some(sink) = &self.metrics_sink {
            config.metrics_sink = Arc::clone(sink);
        }
        if let Some(logger) = &self.logger {
            config.logger = Arc::clone(logger);
        }
        config
    }

    /// Build an unconnected client. Performs no I/O.
    ///
    /// # Errors
    ///
    /// Returns a validation error for invalid options, or an error if the
    /// selected transport cannot be constructed.
    pub fn build(self) -> McpResult<Client> {
        let config = self.build_config();
        match self.transport {
            Some(transport) => Client::new(config, transport),
            None => factory::create_client(config),
        }
    }

    /// Build the client and connect it.
    ///
    /// # Errors
    ///
    /// Everything [`build`](Self::build) and [`Client::connect`] can return.
    pub async fn connect(self) -> McpResult<Client> {
        let client = self.build()?;
        client.connect().await?;
        Ok(client)
    }
}
