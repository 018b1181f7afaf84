//! HTTP JSON-RPC client transport.
//!
//! One `POST {endpoint}` per request, the response body is the response
//! envelope. There is no persistent connection to lose, so a failed TCP
//! connect after `open()` is what counts as connection loss here.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use mcpv2_transport_traits::{
    AtomicMetrics, CredentialProvider, LimitsConfig, TimeoutConfig, Transport,
    TransportCapabilities, TransportError, TransportFuture, TransportKind, TransportMetrics,
    TransportResult, TransportState, TransportStream, codec, validate_request_size,
    validate_response_size,
};
use mcpv2_types::{PROTOCOL_VERSION, Request, RequestId, Response};
use reqwest::{Client as HttpClient, StatusCode, header};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Header carrying the protocol version on every POST
pub const PROTOCOL_VERSION_HEADER: &str = "Mcp-Protocol-Version";

/// HTTP transport configuration
#[derive(Clone, Debug)]
pub struct HttpTransportConfig {
    /// Full URL requests are POSTed to (e.g., <http://localhost:8080/rpc>)
    pub endpoint: String,

    /// Connect and per-request timeouts
    pub timeouts: TimeoutConfig,

    /// User-Agent header; `None` disables it
    pub user_agent: Option<String>,

    /// Protocol version sent in [`PROTOCOL_VERSION_HEADER`]
    pub protocol_version: String,

    /// Extra static headers added to every request
    pub headers: HashMap<String, String>,

    /// Path probed with a GET during `open()`; `None` skips the warmup
    pub health_check_path: Option<String>,

    /// Size limits for requests and responses
    pub limits: LimitsConfig,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/rpc".to_string(),
            timeouts: TimeoutConfig::default(),
            user_agent: Some(format!("mcpv2-client/{}", env!("CARGO_PKG_VERSION"))),
            protocol_version: PROTOCOL_VERSION.to_string(),
            headers: HashMap::new(),
            health_check_path: None,
            limits: LimitsConfig::default(),
        }
    }
}

impl HttpTransportConfig {
    /// Default configuration for `endpoint`
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }
}

/// HTTP JSON-RPC transport
pub struct HttpTransport {
    config: HttpTransportConfig,
    http_client: HttpClient,
    credentials: Option<Arc<dyn CredentialProvider>>,
    state: RwLock<TransportState>,
    capabilities: TransportCapabilities,
    metrics: AtomicMetrics,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.config.endpoint)
            .field("credentials", &self.credentials.is_some())
            .finish()
    }
}

impl HttpTransport {
    /// Create a new transport. Performs no I/O.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConfigurationError`] if the HTTP client cannot be built.
    pub fn new(
        config: HttpTransportConfig,
        credentials: Option<Arc<dyn CredentialProvider>>,
    ) -> TransportResult<Self> {
        // Explicit use_rustls_tls(): features are additive and another crate may enable native-tls
        let mut client_builder = HttpClient::builder()
            .use_rustls_tls()
            .connect_timeout(config.timeouts.connect);

        if let Some(timeout) = config.timeouts.request {
            client_builder = client_builder.timeout(timeout);
        }
        if let Some(ref user_agent) = config.user_agent {
            client_builder = client_builder.user_agent(user_agent);
        }

        let http_client = client_builder
            .build()
            .map_err(|e| TransportError::ConfigurationError(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
            credentials,
            state: RwLock::new(TransportState::Disconnected),
            capabilities: TransportCapabilities::unary(),
            metrics: AtomicMetrics::new(),
        })
    }

    /// The transport configuration
    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    /// Build request headers: protocol version, static headers, then credentials
    async fn build_headers(&self) -> TransportResult<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();

        if let Ok(protocol_value) = header::HeaderValue::from_str(&self.config.protocol_version) {
            headers.insert(PROTOCOL_VERSION_HEADER, protocol_value);
        }

        for (key, value) in &self.config.headers {
            if let (Ok(k), Ok(v)) = (
                header::HeaderName::from_bytes(key.as_bytes()),
                header::HeaderValue::from_str(value),
            ) {
                headers.insert(k, v);
            } else {
                warn!(header = %key, "skipping invalid static header");
            }
        }

        if let Some(credentials) = &self.credentials {
            for (key, value) in credentials.auth_headers().await? {
                let name = header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                    TransportError::AuthenticationFailed(format!("invalid header name {key}: {e}"))
                })?;
                let value = header::HeaderValue::from_str(&value).map_err(|e| {
                    TransportError::AuthenticationFailed(format!("invalid value for {key}: {e}"))
                })?;
                headers.insert(name, value);
            }
        }

        Ok(headers)
    }

    async fn ensure_connected(&self) -> TransportResult<()> {
        match &*self.state.read().await {
            TransportState::Connected => Ok(()),
            TransportState::Failed { reason } => Err(TransportError::ConnectionLost(reason.clone())),
            other => Err(TransportError::NotConnected(format!(
                "HTTP transport is {other}"
            ))),
        }
    }

    async fn mark_failed(&self, reason: &str) {
        *self.state.write().await = TransportState::Failed {
            reason: reason.to_string(),
        };
    }

    fn classify(&self, err: &reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::RequestTimeout {
                operation: "http post".to_string(),
                timeout: self.config.timeouts.request.unwrap_or_default(),
            }
        } else {
            TransportError::ConnectionLost(err.to_string())
        }
    }

    #[instrument(skip(self, request), fields(id = %request.id(), method = request.method()))]
    async fn post(&self, request: Request) -> TransportResult<Response> {
        self.ensure_connected().await?;

        let body = codec::encode_request(&request)?;
        validate_request_size(body.len(), &self.config.limits)?;
        let headers = self.build_headers().await?;
        let body_len = body.len();

        let started = Instant::now();
        let response = match self
            .http_client
            .post(&self.config.endpoint)
            .headers(headers)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .body(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let err = self.classify(&e);
                if err.is_connection_lost() {
                    warn!(error = %e, "HTTP endpoint unreachable, marking transport failed");
                    self.mark_failed(&e.to_string()).await;
                }
                return Err(err);
            }
        };
        self.metrics.record_sent(body_len);

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| self.classify(&e))?;
        validate_response_size(bytes.len(), &self.config.limits)?;
        self.metrics.record_received(bytes.len());
        self.metrics.update_latency(started.elapsed());

        if !status.is_success() {
            return Self::decode_error_status(status, &bytes, request.id());
        }

        let decoded = codec::decode_response(&bytes)?;
        if &decoded.id != request.id() {
            return Err(TransportError::ProtocolError(format!(
                "response id {} does not match request id {}",
                decoded.id,
                request.id()
            )));
        }
        debug!(status = %status, bytes = bytes.len(), "received HTTP response");
        Ok(decoded)
    }

    /// A non-2xx status may still carry an error envelope; anything else
    /// becomes a remote failure named after the status.
    fn decode_error_status(
        status: StatusCode,
        bytes: &[u8],
        id: &RequestId,
    ) -> TransportResult<Response> {
        if let Ok(response) = codec::decode_response(bytes)
            && response.is_error()
            && &response.id == id
        {
            return Ok(response);
        }
        Err(TransportError::Remote {
            kind: format!("http_{}", status.as_u16()),
            message: format!(
                "HTTP {}: {}",
                status,
                String::from_utf8_lossy(&bytes[..bytes.len().min(256)])
            ),
            code: Some(i64::from(status.as_u16())),
        })
    }

    async fn warmup(&self, path: &str) -> TransportResult<()> {
        let base = Url::parse(&self.config.endpoint)
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        let url = base
            .join(path)
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let response = self
            .http_client
            .get(url.as_str())
            .timeout(self.config.timeouts.connect)
            .send()
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::ConnectionFailed(format!(
                "health check {} returned {}",
                url,
                response.status()
            )));
        }
        Ok(())
    }
}

impl Transport for HttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    fn capabilities(&self) -> &TransportCapabilities {
        &self.capabilities
    }

    fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn state(&self) -> Pin<Box<dyn Future<Output = TransportState> + Send + '_>> {
        Box::pin(async move { self.state.read().await.clone() })
    }

    fn metrics(&self) -> TransportMetrics {
        self.metrics.snapshot()
    }

    fn open(&self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            info!(endpoint = %self.config.endpoint, "opening HTTP transport");
            *self.state.write().await = TransportState::Connecting;
            self.metrics.connections.fetch_add(1, Ordering::Relaxed);

            let result = match Url::parse(&self.config.endpoint) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {
                    match &self.config.health_check_path {
                        Some(path) => self.warmup(path).await,
                        None => Ok(()),
                    }
                }
                Ok(url) => Err(TransportError::ConnectionFailed(format!(
                    "unsupported URL scheme '{}' for HTTP transport",
                    url.scheme()
                ))),
                Err(e) => Err(TransportError::ConnectionFailed(format!(
                    "invalid endpoint {}: {e}",
                    self.config.endpoint
                ))),
            };

            match result {
                Ok(()) => {
                    *self.state.write().await = TransportState::Connected;
                    info!("HTTP transport ready");
                    Ok(())
                }
                Err(e) => {
                    self.metrics
                        .failed_connections
                        .fetch_add(1, Ordering::Relaxed);
                    *self.state.write().await = TransportState::Disconnected;
                    Err(e)
                }
            }
        })
    }

    fn send(&self, request: Request) -> TransportFuture<'_, Response> {
        Box::pin(self.post(request))
    }

    fn send_stream(&self, request: Request) -> TransportFuture<'_, TransportStream> {
        Box::pin(async move {
            Err(TransportError::Unsupported(format!(
                "streaming method '{}' is not supported over HTTP",
                request.method()
            )))
        })
    }

    fn cancel(&self, id: &RequestId) -> TransportFuture<'_, ()> {
        let id = id.clone();
        Box::pin(async move {
            Err(TransportError::Unsupported(format!(
                "cannot cancel {id}: HTTP requests have no cancellation channel"
            )))
        })
    }

    fn close(&self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            if !matches!(*state, TransportState::Disconnected) {
                info!(endpoint = %self.config.endpoint, "closing HTTP transport");
            }
            *state = TransportState::Disconnected;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = HttpTransportConfig::new("http://example.test/rpc");
        assert_eq!(config.endpoint, "http://example.test/rpc");
        assert_eq!(config.protocol_version, PROTOCOL_VERSION);
        assert!(config.health_check_path.is_none());
    }

    #[test]
    fn test_error_status_with_envelope() {
        let body = br#"{"id":"r-1","error":{"kind":"bad_request","message":"nope"}}"#;
        let response =
            HttpTransport::decode_error_status(StatusCode::BAD_REQUEST, body, &"r-1".into())
                .unwrap();
        assert_eq!(response.error().unwrap().kind, "bad_request");
    }

    #[test]
    fn test_error_status_without_envelope() {
        let err = HttpTransport::decode_error_status(
            StatusCode::SERVICE_UNAVAILABLE,
            b"upstream down",
            &"r-1".into(),
        )
        .unwrap_err();
        match err {
            TransportError::Remote { kind, code, .. } => {
                assert_eq!(kind, "http_503");
                assert_eq!(code, Some(503));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_new_is_side_effect_free() {
        let transport =
            HttpTransport::new(HttpTransportConfig::new("http://127.0.0.1:1/rpc"), None).unwrap();
        assert_eq!(transport.state().await, TransportState::Disconnected);
        assert_eq!(transport.metrics().connections, 0);
    }
}
