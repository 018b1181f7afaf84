//! gRPC client transport
//!
//! `send` is the unary `Invoke` RPC, `send_stream` the server-streaming
//! `InvokeStream` RPC and `cancel` the unary `Cancel` RPC. Credentials are
//! attached as metadata on every call.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use mcpv2_transport_traits::{
    AtomicMetrics, CredentialProvider, LimitsConfig, TimeoutConfig, Transport,
    TransportCapabilities, TransportError, TransportFuture, TransportKind, TransportMetrics,
    TransportResult, TransportState, TransportStream,
};
use mcpv2_types::{Request, RequestId, Response};
use prost::Message as _;
use tokio::sync::{RwLock, oneshot};
use tonic::metadata::{Ascii, MetadataKey, MetadataValue};
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tracing::{debug, info, instrument, warn};

use crate::convert;
use crate::error::{GrpcError, status_to_transport_error};
use crate::proto::{self, mcp_service_client::McpServiceClient};

/// gRPC transport configuration
#[derive(Debug, Clone)]
pub struct GrpcConfig {
    /// Server address (e.g., `http://[::1]:50051`)
    pub endpoint: String,

    /// Connect and per-call timeouts
    pub timeouts: TimeoutConfig,

    /// Message size limits, enforced by the codec. Stream items are exempt
    /// from the response limit unless `enforce_on_streams` is set.
    pub limits: LimitsConfig,

    /// Static metadata added to every call
    pub metadata: HashMap<String, String>,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:50051".to_string(),
            timeouts: TimeoutConfig::default(),
            limits: LimitsConfig::default(),
            metadata: HashMap::new(),
        }
    }
}

impl GrpcConfig {
    /// Create a configuration for `endpoint` with defaults for everything else
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }
}

type ActiveStreams = Arc<DashMap<RequestId, oneshot::Sender<()>>>;

/// Removes a stream's registration when the stream is dropped or finishes.
#[derive(Debug)]
struct StreamRegistration {
    active: ActiveStreams,
    id: RequestId,
}

impl Drop for StreamRegistration {
    fn drop(&mut self) {
        self.active.remove(&self.id);
    }
}

/// gRPC transport over one tonic channel
#[derive(Debug)]
pub struct GrpcTransport {
    config: GrpcConfig,
    credentials: Option<Arc<dyn CredentialProvider>>,
    capabilities: TransportCapabilities,
    client: RwLock<Option<McpServiceClient<Channel>>>,
    state: Arc<RwLock<TransportState>>,
    metrics: Arc<AtomicMetrics>,
    active_streams: ActiveStreams,
}

impl GrpcTransport {
    /// Create a transport. No I/O happens until [`open`](Transport::open).
    pub fn new(config: GrpcConfig, credentials: Option<Arc<dyn CredentialProvider>>) -> Self {
        let capabilities = TransportCapabilities {
            max_message_size: config.limits.max_response_size,
            ..TransportCapabilities::streaming()
        };
        Self {
            config,
            credentials,
            capabilities,
            client: RwLock::new(None),
            state: Arc::new(RwLock::new(TransportState::Disconnected)),
            metrics: Arc::new(AtomicMetrics::default()),
            active_streams: Arc::new(DashMap::new()),
        }
    }

    /// Number of server streams currently open
    pub fn active_stream_count(&self) -> usize {
        self.active_streams.len()
    }

    async fn connected_client(&self) -> TransportResult<McpServiceClient<Channel>> {
        match &*self.state.read().await {
            TransportState::Connected => {}
            TransportState::Failed { reason } => {
                return Err(TransportError::ConnectionLost(reason.clone()));
            }
            other => {
                return Err(TransportError::NotConnected(format!(
                    "gRPC transport is {other}"
                )));
            }
        }
        self.client
            .read()
            .await
            .clone()
            .ok_or_else(|| TransportError::NotConnected("gRPC channel is not open".to_string()))
    }

    /// Wrap `message` in a tonic request carrying static and credential metadata.
    async fn authorized<T>(&self, message: T) -> TransportResult<tonic::Request<T>> {
        let mut request = tonic::Request::new(message);
        let mut entries = self.config.metadata.clone();
        if let Some(provider) = &self.credentials {
            entries.extend(provider.auth_headers().await?);
        }
        for (name, value) in entries {
            let key = MetadataKey::<Ascii>::from_bytes(name.to_ascii_lowercase().as_bytes()).map_err(|e| {
                TransportError::ConfigurationError(format!("invalid metadata key {name}: {e}"))
            })?;
            let value = MetadataValue::<Ascii>::try_from(value.as_str()).map_err(|e| {
                TransportError::AuthenticationFailed(format!("invalid metadata value for {name}: {e}"))
            })?;
            request.metadata_mut().insert(key, value);
        }
        Ok(request)
    }

    fn request_timeout(&self) -> Duration {
        self.config.timeouts.request.unwrap_or_default()
    }

    /// Run one RPC under the configured request timeout.
    async fn deadline<T, F>(&self, operation: &str, call: F) -> TransportResult<T>
    where
        F: Future<Output = Result<tonic::Response<T>, tonic::Status>>,
    {
        let outcome = match self.config.timeouts.request {
            Some(timeout) => tokio::time::timeout(timeout, call).await.map_err(|_| {
                TransportError::RequestTimeout {
                    operation: operation.to_string(),
                    timeout,
                }
            })?,
            None => call.await,
        };
        match outcome {
            Ok(reply) => Ok(reply.into_inner()),
            Err(status) => Err(self.classify(&status).await),
        }
    }

    /// Map a status and mark the transport failed on connection loss.
    async fn classify(&self, status: &tonic::Status) -> TransportError {
        let err = status_to_transport_error(status, self.request_timeout());
        if err.is_connection_lost() {
            fail_transport(&self.state, status.message()).await;
        }
        err
    }

    async fn connect_channel(&self) -> TransportResult<McpServiceClient<Channel>> {
        let mut endpoint = Endpoint::from_shared(self.config.endpoint.clone())
            .map_err(|e| GrpcError::config(format!("Invalid endpoint: {e}")))?
            .connect_timeout(self.config.timeouts.connect);
        if self.config.endpoint.starts_with("https://") {
            endpoint = endpoint
                .tls_config(ClientTlsConfig::new().with_native_roots())
                .map_err(GrpcError::from)?;
        }

        let channel = endpoint.connect().await.map_err(GrpcError::from)?;

        let mut client = McpServiceClient::new(channel);
        if let Some(max) = self.config.limits.max_response_size {
            client = client.max_decoding_message_size(max);
        }
        if let Some(max) = self.config.limits.max_request_size {
            client = client.max_encoding_message_size(max);
        }
        Ok(client)
    }

    #[instrument(skip(self, request), fields(id = %request.id(), method = request.method()))]
    async fn invoke(&self, request: Request) -> TransportResult<Response> {
        let mut client = self.connected_client().await?;
        let message = convert::request_to_proto(&request)?;
        let size = message.encoded_len();
        let call = self.authorized(message).await?;

        let started = Instant::now();
        let reply = self.deadline("grpc invoke", client.invoke(call)).await?;
        self.metrics.record_sent(size);
        self.metrics.record_received(reply.encoded_len());
        self.metrics.update_latency(started.elapsed());

        let response = convert::response_from_proto(reply)?;
        if response.id != *request.id() {
            return Err(TransportError::ProtocolError(format!(
                "response id {} does not match request id {}",
                response.id,
                request.id()
            )));
        }
        debug!("unary call complete");
        Ok(response)
    }

    #[instrument(skip(self, request), fields(id = %request.id(), method = request.method()))]
    async fn invoke_stream(&self, request: Request) -> TransportResult<TransportStream> {
        let mut client = self.connected_client().await?;
        if !self.config.limits.enforce_on_streams {
            client = client.max_decoding_message_size(usize::MAX);
        }
        let id = request.id().clone();
        if self.active_streams.contains_key(&id) {
            return Err(TransportError::InvalidRequest(format!(
                "stream {id} is already open"
            )));
        }
        let message = convert::request_to_proto(&request)?;
        let size = message.encoded_len();
        let call = self.authorized(message).await?;

        let mut inbound = self
            .deadline("grpc invoke_stream", client.invoke_stream(call))
            .await?;
        self.metrics.record_sent(size);

        let (stop_tx, mut stop_rx) = oneshot::channel();
        self.active_streams.insert(id.clone(), stop_tx);
        let registration = StreamRegistration {
            active: Arc::clone(&self.active_streams),
            id,
        };
        let metrics = Arc::clone(&self.metrics);
        let state = Arc::clone(&self.state);
        let timeout = self.request_timeout();

        let stream = async_stream::stream! {
            let registration = registration;
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => {
                        debug!(id = %registration.id, "stream cancelled locally");
                        break;
                    }
                    item = inbound.message() => match item {
                        Ok(Some(message)) => {
                            metrics.record_received(message.encoded_len());
                            yield convert::response_from_proto(message).map_err(TransportError::from);
                        }
                        Ok(None) => break,
                        Err(status) => {
                            let err = status_to_transport_error(&status, timeout);
                            if err.is_connection_lost() {
                                fail_transport(&state, status.message()).await;
                            }
                            yield Err(err);
                            break;
                        }
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

async fn fail_transport(state: &RwLock<TransportState>, reason: &str) {
    let mut state = state.write().await;
    if state.is_connected() {
        warn!(reason, "gRPC connection lost");
        *state = TransportState::Failed {
            reason: reason.to_string(),
        };
    }
}

impl Transport for GrpcTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Grpc
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
            {
                let mut state = self.state.write().await;
                match &*state {
                    TransportState::Connected => return Ok(()),
                    TransportState::Disconnected => *state = TransportState::Connecting,
                    other => {
                        return Err(TransportError::ConnectionFailed(format!(
                            "cannot open a gRPC transport that is {other}"
                        )));
                    }
                }
            }
            self.metrics.connections.fetch_add(1, Ordering::Relaxed);

            match self.connect_channel().await {
                Ok(client) => {
                    *self.client.write().await = Some(client);
                    *self.state.write().await = TransportState::Connected;
                    info!(endpoint = %self.config.endpoint, "Connected to gRPC server");
                    Ok(())
                }
                Err(e) => {
                    self.metrics
                        .failed_connections
                        .fetch_add(1, Ordering::Relaxed);
                    *self.state.write().await = TransportState::Disconnected;
                    warn!(endpoint = %self.config.endpoint, error = %e, "gRPC connect failed");
                    // Every open-time failure is a connection failure
                    Err(match e {
                        TransportError::ConnectionFailed(_) => e,
                        other => TransportError::ConnectionFailed(other.to_string()),
                    })
                }
            }
        })
    }

    fn send(&self, request: Request) -> TransportFuture<'_, Response> {
        Box::pin(self.invoke(request))
    }

    fn send_stream(&self, request: Request) -> TransportFuture<'_, TransportStream> {
        Box::pin(self.invoke_stream(request))
    }

    fn cancel(&self, id: &RequestId) -> TransportFuture<'_, ()> {
        let id = id.clone();
        Box::pin(async move {
            if let Some((_, stop)) = self.active_streams.remove(&id) {
                let _ = stop.send(());
            }

            let mut client = self.connected_client().await?;
            let call = self.authorized(proto::CancelRequest { id: id.to_string() }).await?;
            let reply = self.deadline("grpc cancel", client.cancel(call)).await?;
            self.metrics
                .cancellations_sent
                .fetch_add(1, Ordering::Relaxed);
            debug!(%id, cancelled = reply.cancelled, "cancel acknowledged");
            Ok(())
        })
    }

    fn close(&self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            if matches!(*state, TransportState::Disconnected) {
                return Ok(());
            }
            *state = TransportState::Disconnecting;

            let streams: Vec<RequestId> =
                self.active_streams.iter().map(|e| e.key().clone()).collect();
            for id in streams {
                if let Some((_, stop)) = self.active_streams.remove(&id) {
                    let _ = stop.send(());
                }
            }
            // Dropping the last client handle tears the channel down
            self.client.write().await.take();

            *state = TransportState::Disconnected;
            info!(endpoint = %self.config.endpoint, "gRPC transport closed");
            Ok(())
        })
    }
}
