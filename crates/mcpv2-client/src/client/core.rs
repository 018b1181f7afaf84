//! Core client implementation.
//!
//! [`Client`] is a cheap handle around `Arc<ClientInner>`: clones share the
//! transport, the session context and the lifecycle state, so a clone is the
//! same client rather than a second connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use mcpv2_transport_traits::{Transport, TransportError, TransportKind};
use mcpv2_types::{
    ErrorKind, IdWindow, McpError, McpResult, Request, RequestId, RequestIdGenerator, Response,
};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use super::builder::ClientBuilder;
use super::options::{ClientState, ClientStats, InvokeOptions};
use super::stream::ResponseStream;
use crate::config::{ClientConfig, ClientOptions};
use crate::context::ContextManager;
use crate::events::{ClientEvent, EventBus};
use crate::observability::{MetricsSink, Outcome};

/// Transport-agnostic MCP v2 client.
///
/// # Examples
///
/// ```rust,no_run
/// use mcpv2_client::{ClientBuilder, InvokeOptions};
/// use mcpv2_transport_traits::TransportKind;
/// use serde_json::json;
///
/// # async fn example() -> mcpv2_types::McpResult<()> {
/// let client = ClientBuilder::new()
///     .with_transport_kind(TransportKind::Http)
///     .with_endpoint("http://localhost:8080/rpc")
///     .connect()
///     .await?;
///
/// let response = client
///     .invoke("echo", json!({"text": "hi"}), InvokeOptions::default())
///     .await?;
/// assert_eq!(response.result(), Some(&json!({"text": "hi"})));
///
/// client.disconnect().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
pub(crate) struct ClientInner {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) events: EventBus,
    options: ClientOptions,
    client_id: String,
    context: ContextManager,
    lifecycle: Mutex<Lifecycle>,
    ids: RequestIdGenerator,
    id_window: Mutex<IdWindow>,
    metrics_sink: Arc<dyn MetricsSink>,
    requests_total: AtomicU64,
    responses_total: AtomicU64,
    errors_total: AtomicU64,
    pending: Arc<AtomicUsize>,
}

#[derive(Debug)]
struct Lifecycle {
    state: ClientState,
    connected_at: Option<DateTime<Utc>>,
    closed_reason: Option<String>,
}

/// Counts one call or stream as pending while alive.
#[derive(Debug)]
pub(crate) struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

impl ClientInner {
    fn ensure_ready(&self) -> McpResult<()> {
        let lifecycle = self.lifecycle.lock();
        match lifecycle.state {
            ClientState::Ready => Ok(()),
            ClientState::Closing | ClientState::Closed => Err(match &lifecycle.closed_reason {
                Some(reason) => {
                    McpError::new(ErrorKind::ClientClosed, format!("client is closed: {reason}"))
                }
                None => McpError::client_closed(),
            }),
            ClientState::Created | ClientState::Connecting => Err(McpError::connection(
                "client is not connected; call connect() first",
            )),
        }
    }

    /// Attach the context snapshot and client metadata.
    fn prepare(&self, mut request: Request, options: &InvokeOptions) -> Request {
        if options.with_context && request.context().is_none() {
            request = request.with_context(self.context.snapshot());
        }
        request = request
            .with_metadata_entry("client_id", Value::String(self.client_id.clone()))
            .with_metadata_entry("client_version", Value::String(crate::VERSION.to_string()));

        if let Some(signals) = &options.learning_signals {
            let mut merged = request
                .metadata()
                .and_then(|m| m.get("learning_signals"))
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            merged.extend(signals.clone());
            request = request.with_metadata_entry("learning_signals", Value::Object(merged));
        }
        request
    }

    fn record_failure(&self, id: Option<&RequestId>, method: &str, err: McpError) -> McpError {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
        self.metrics_sink
            .record_outcome(method, Outcome::Error(err.kind));
        self.events.emit(ClientEvent::ErrorOccurred {
            request_id: id.cloned(),
            method: Some(method.to_string()),
            kind: err.kind,
            message: err.message.clone(),
        });
        err
    }

    /// Account for one response (or stream item) and hand it to the caller.
    ///
    /// Stamps the transport and client-side timing into the metadata.
    pub(crate) fn complete(
        &self,
        request: &Request,
        mut response: Response,
        sent_at: DateTime<Utc>,
        latency: Duration,
    ) -> McpResult<Response> {
        let method = request.method();
        self.responses_total.fetch_add(1, Ordering::Relaxed);
        self.metrics_sink.record_latency(method, latency);

        response.metadata.transport = Some(self.transport.kind().to_string());
        response.metadata.sent_at = Some(sent_at);
        response.metadata.received_at = Some(Utc::now());

        if let Some(detail) = response.protocol_violation() {
            self.events.emit_protocol_violation(&response.id, detail);
        }
        self.events.emit(ClientEvent::ResponseReceived {
            request_id: response.id.clone(),
            method: method.to_string(),
            latency_ms: latency.as_millis() as u64,
            is_error: response.is_error(),
        });

        if self.context.record(request, &response) {
            self.events.emit(ClientEvent::ContextUpdated {
                session_id: self.context.session_id().to_string(),
                turns: self.context.len(),
            });
        }

        match response.error_for_remote() {
            Ok(response) => {
                self.metrics_sink.record_outcome(method, Outcome::Success);
                Ok(response)
            }
            Err(err) => Err(self.record_failure(Some(request.id()), method, err)),
        }
    }

    /// Classify a transport failure, closing the client if the connection died.
    pub(crate) async fn transport_failure(
        &self,
        id: &RequestId,
        method: &str,
        err: TransportError,
        operation: &str,
    ) -> McpError {
        let reason = err.to_string();
        let mapped = McpError::from(err)
            .with_request_id(id.as_str())
            .with_operation(operation);
        if mapped.kind == ErrorKind::ConnectionLost {
            self.connection_lost(&reason).await;
        }
        self.record_failure(Some(id), method, mapped)
    }

    fn timeout_failure(&self, id: &RequestId, method: &str, timeout: Duration, operation: &str) -> McpError {
        let err = McpError::timeout(format!("no response to '{method}' within {timeout:?}"))
            .with_request_id(id.as_str())
            .with_operation(operation);
        self.record_failure(Some(id), method, err)
    }

    /// Ready → Closing → Closed after the transport died.
    async fn connection_lost(&self, reason: &str) {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != ClientState::Ready {
                return;
            }
            lifecycle.state = ClientState::Closing;
            lifecycle.closed_reason = Some(format!("connection lost: {reason}"));
        }
        warn!(transport = %self.transport.kind(), %reason, "connection lost, closing client");
        self.events.emit(ClientEvent::ConnectionLost {
            transport: self.transport.kind(),
            reason: reason.to_string(),
        });

        if let Err(e) = self.transport.close().await {
            debug!(error = %e, "closing failed transport");
        }
        self.lifecycle.lock().state = ClientState::Closed;
    }

    fn deadline(&self, options: &InvokeOptions) -> Duration {
        options.timeout.unwrap_or(self.options.default_timeout)
    }

    #[instrument(skip_all, fields(id = %request.id(), method = %request.method()))]
    async fn call(&self, request: Request, options: InvokeOptions) -> McpResult<Response> {
        self.ensure_ready()?;
        self.id_window.lock().admit(request.id())?;

        let request = self.prepare(request, &options);
        let timeout = self.deadline(&options);
        let id = request.id().clone();
        let method = request.method();

        let _in_flight = InFlight::new(&self.pending);
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.events
            .emit_request_sent(&id, method, request.context().is_some());

        // Dropping the send future on timeout abandons the request in the transport
        let sent_at = Utc::now();
        let started = Instant::now();
        match tokio::time::timeout(timeout, self.transport.send(request.clone())).await {
            Ok(Ok(response)) => self.complete(&request, response, sent_at, started.elapsed()),
            Ok(Err(err)) => Err(self.transport_failure(&id, method, err, "invoke").await),
            Err(_) => Err(self.timeout_failure(&id, method, timeout, "invoke")),
        }
    }

    #[instrument(skip_all, fields(id = %request.id(), method = %request.method()))]
    async fn open_stream(
        self: &Arc<Self>,
        request: Request,
        options: InvokeOptions,
    ) -> McpResult<ResponseStream> {
        self.ensure_ready()?;
        if !self.transport.capabilities().supports_streaming {
            let err = McpError::unsupported(format!(
                "the {} transport does not support streaming",
                self.transport.kind()
            ))
            .with_request_id(request.id().as_str())
            .with_operation("stream");
            return Err(self.record_failure(Some(request.id()), request.method(), err));
        }
        self.id_window.lock().admit(request.id())?;

        let request = self.prepare(request, &options);
        let timeout = self.deadline(&options);
        let id = request.id().clone();
        let method = request.method().to_string();

        let in_flight = InFlight::new(&self.pending);
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.events
            .emit_request_sent(&id, &method, request.context().is_some());

        let sent_at = Utc::now();
        let started = Instant::now();
        let stream =
            match tokio::time::timeout(timeout, self.transport.send_stream(request.clone())).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(err)) => {
                    return Err(self.transport_failure(&id, &method, err, "stream").await);
                }
                Err(_) => {
                    // The server may already be producing items
                    if let Err(e) = self.transport.cancel(&id).await {
                        debug!(error = %e, "cancel after stream open timeout failed");
                    }
                    return Err(self.timeout_failure(&id, &method, timeout, "stream"));
                }
            };
        Ok(ResponseStream::new(
            Arc::clone(self),
            request,
            stream,
            in_flight,
            sent_at,
            started,
        ))
    }
}

impl Client {
    /// Create a client over an already built transport. Performs no I/O.
    ///
    /// The configuration's credential provider is not consulted here; it
    /// is the transport's business. Use [`create_client`](crate::create_client)
    /// to build the transport from the options.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the options are invalid.
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> McpResult<Self> {
        config.validate()?;
        let ClientConfig {
            options,
            metrics_sink,
            logger,
            ..
        } = config;

        let client_id = options
            .client_id
            .clone()
            .unwrap_or_else(|| format!("mcpv2-{}", uuid::Uuid::new_v4()));
        let context = match &options.session_id {
            Some(session_id) => ContextManager::new(session_id.clone(), options.max_context_turns),
            None => ContextManager::with_random_session(options.max_context_turns),
        };

        let inner = ClientInner {
            events: EventBus::new(options.event_capacity, logger),
            id_window: Mutex::new(IdWindow::new(options.id_window)),
            transport,
            client_id,
            context,
            lifecycle: Mutex::new(Lifecycle {
                state: ClientState::Created,
                connected_at: None,
                closed_reason: None,
            }),
            ids: RequestIdGenerator::new(),
            metrics_sink,
            requests_total: AtomicU64::new(0),
            responses_total: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            pending: Arc::new(AtomicUsize::new(0)),
            options,
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Start building a client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Open the transport.
    ///
    /// Bounded by `connect_timeout`. A failed connect returns the client to
    /// `Created`, so it may be retried. Connecting a ready client is a no-op.
    ///
    /// # Errors
    ///
    /// - `Connection` if the transport cannot be opened in time
    /// - `ClientClosed` after `disconnect()`
    #[instrument(skip(self), fields(transport = %self.inner.transport.kind(), endpoint = %self.inner.transport.endpoint()))]
    pub async fn connect(&self) -> McpResult<()> {
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            match lifecycle.state {
                ClientState::Created => lifecycle.state = ClientState::Connecting,
                ClientState::Ready => return Ok(()),
                ClientState::Connecting => {
                    return Err(McpError::connection("connect already in progress"));
                }
                ClientState::Closing | ClientState::Closed => return Err(McpError::client_closed()),
            }
        }

        let transport = &self.inner.transport;
        let timeout = self.inner.options.connect_timeout;
        let result = match tokio::time::timeout(timeout, transport.open()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(McpError::connection(e.to_string())),
            Err(_) => {
                // Reset a half-open transport so the next attempt starts clean
                if let Err(e) = transport.close().await {
                    debug!(error = %e, "closing transport after connect timeout");
                }
                Err(McpError::connection(format!(
                    "connect timed out after {timeout:?}"
                )))
            }
        };

        let superseded = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.state == ClientState::Connecting {
                match &result {
                    Ok(()) => {
                        lifecycle.state = ClientState::Ready;
                        lifecycle.connected_at = Some(Utc::now());
                    }
                    Err(_) => lifecycle.state = ClientState::Created,
                }
                false
            } else {
                true
            }
        };
        if superseded {
            // disconnect() ran while the transport was opening
            if let Err(e) = transport.close().await {
                debug!(error = %e, "closing transport opened after disconnect");
            }
            return Err(McpError::client_closed());
        }

        match result {
            Ok(()) => {
                info!("client connected");
                self.inner.events.emit(ClientEvent::ConnectionOpened {
                    transport: transport.kind(),
                    endpoint: transport.endpoint().to_string(),
                });
                Ok(())
            }
            Err(err) => {
                let err = err.with_operation("connect");
                self.inner.events.emit(ClientEvent::ErrorOccurred {
                    request_id: None,
                    method: None,
                    kind: err.kind,
                    message: err.message.clone(),
                });
                Err(err)
            }
        }
    }

    /// Call `method` with `params` and wait for the response.
    ///
    /// The current context snapshot is attached unless
    /// `options.with_context` is `false`. A successful result is recorded as
    /// a turn; a failed call leaves the context untouched. The returned
    /// response carries the transport and client-side timing in its
    /// metadata.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty method or non-object params
    /// - `Timeout` when no response arrives within the deadline
    /// - `Remote` when the server answers with an error object
    /// - `ConnectionLost` when the transport dies; the client is closed afterwards
    /// - `ClientClosed` after `disconnect()`
    pub async fn invoke(
        &self,
        method: impl Into<String>,
        params: Value,
        options: InvokeOptions,
    ) -> McpResult<Response> {
        self.inner.ensure_ready()?;
        let request = Request::with_id(self.inner.ids.next_id(), method, params)?;
        self.inner.call(request, options).await
    }

    /// Send a caller-built request.
    ///
    /// Same as [`invoke`](Self::invoke); additionally rejects an id already
    /// used within the session window.
    pub async fn send_request(
        &self,
        request: Request,
        options: InvokeOptions,
    ) -> McpResult<Response> {
        self.inner.call(request, options).await
    }

    /// Start a streaming call.
    ///
    /// The timeout bounds opening the stream, not its duration.
    ///
    /// # Errors
    ///
    /// `UnsupportedOperation` on transports without streaming, plus the
    /// errors of [`invoke`](Self::invoke).
    pub async fn stream(
        &self,
        method: impl Into<String>,
        params: Value,
        options: InvokeOptions,
    ) -> McpResult<ResponseStream> {
        self.inner.ensure_ready()?;
        let request = Request::with_id(self.inner.ids.next_id(), method, params)?;
        self.inner.open_stream(request, options).await
    }

    /// Start a streaming call from a caller-built request.
    pub async fn stream_request(
        &self,
        request: Request,
        options: InvokeOptions,
    ) -> McpResult<ResponseStream> {
        self.inner.open_stream(request, options).await
    }

    /// Close the transport. Idempotent; every later call fails with
    /// `ClientClosed`.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if closing failed; the client is closed
    /// regardless.
    pub async fn disconnect(&self) -> McpResult<()> {
        let was_ready = {
            let mut lifecycle = self.inner.lifecycle.lock();
            match lifecycle.state {
                ClientState::Closing | ClientState::Closed => return Ok(()),
                state => {
                    lifecycle.state = ClientState::Closing;
                    state == ClientState::Ready
                }
            }
        };

        let result = self.inner.transport.close().await;
        self.inner.lifecycle.lock().state = ClientState::Closed;

        if was_ready {
            info!("client disconnected");
            self.inner.events.emit(ClientEvent::ConnectionClosed {
                transport: self.inner.transport.kind(),
                endpoint: self.inner.transport.endpoint().to_string(),
            });
        }
        result.map_err(McpError::from)
    }

    /// Receive subsequent client events
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    /// Current statistics
    pub fn stats(&self) -> ClientStats {
        let (state, connected_at) = {
            let lifecycle = self.inner.lifecycle.lock();
            (lifecycle.state, lifecycle.connected_at)
        };
        ClientStats {
            transport: self.inner.transport.kind(),
            state,
            connected_at,
            requests_total: self.inner.requests_total.load(Ordering::Relaxed),
            responses_total: self.inner.responses_total.load(Ordering::Relaxed),
            errors_total: self.inner.errors_total.load(Ordering::Relaxed),
            pending_requests: self.inner.pending.load(Ordering::Relaxed),
            context_turns: self.inner.context.len(),
            transport_metrics: self.inner.transport.metrics(),
        }
    }

    /// Lifecycle state
    pub fn state(&self) -> ClientState {
        self.inner.lifecycle.lock().state
    }

    /// Whether calls are currently accepted
    pub fn is_ready(&self) -> bool {
        self.state() == ClientState::Ready
    }

    /// The session context
    pub fn context(&self) -> &ContextManager {
        &self.inner.context
    }

    /// An independent copy of the session context
    pub fn fork_context(&self) -> ContextManager {
        self.inner.context.fork()
    }

    /// Identity sent as `metadata.client_id`
    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    /// Transport in use
    pub fn transport_kind(&self) -> TransportKind {
        self.inner.transport.kind()
    }

    /// Remote endpoint
    pub fn endpoint(&self) -> &str {
        self.inner.transport.endpoint()
    }

    /// Options this client was built with
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }
}
