//! [`Transport`] implementation for [`WebSocketTransport`].

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use futures::{SinkExt as _, StreamExt as _};
use mcpv2_transport_traits::{
    Transport, TransportCapabilities, TransportError, TransportFuture, TransportKind,
    TransportMetrics, TransportResult, TransportState, TransportStream, codec,
    validate_request_size,
};
use mcpv2_types::{Request, RequestId, Response};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tracing::{debug, info, instrument, trace, warn};

use crate::types::{Pending, PendingGuard, WebSocketTransport, fail_all_pending};

/// How long `close()` waits for each background task before aborting it
const TASK_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

impl WebSocketTransport {
    async fn ensure_connected(&self) -> TransportResult<()> {
        match &*self.state.read().await {
            TransportState::Connected => Ok(()),
            TransportState::Failed { reason } => Err(TransportError::ConnectionLost(reason.clone())),
            other => Err(TransportError::NotConnected(format!(
                "WebSocket transport is {other}"
            ))),
        }
    }

    /// Register `entry` under `id`, refusing ids that are already in flight.
    fn register(&self, id: &RequestId, entry: Pending) -> TransportResult<()> {
        match self.pending.entry(id.clone()) {
            Entry::Occupied(_) => Err(TransportError::InvalidRequest(format!(
                "request id {id} is already in flight"
            ))),
            Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
        }
    }

    async fn write_text(&self, text: String) -> TransportResult<()> {
        let len = text.len();
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(TransportError::NotConnected(
                "WebSocket writer is not available".to_string(),
            ));
        };
        writer
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::ConnectionLost(format!("write failed: {e}")))?;
        self.metrics.record_sent(len);
        Ok(())
    }

    /// Build the handshake request with credential and static headers.
    async fn handshake_request(
        &self,
    ) -> TransportResult<tokio_tungstenite::tungstenite::handshake::client::Request> {
        let mut request = self
            .config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| {
                TransportError::ConnectionFailed(format!("invalid URL {}: {e}", self.config.url))
            })?;

        let mut headers = self.config.headers.clone();
        if let Some(provider) = &self.credentials {
            headers.extend(provider.auth_headers().await?);
        }
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                TransportError::ConfigurationError(format!("invalid header name {name}: {e}"))
            })?;
            let value = HeaderValue::from_str(&value).map_err(|e| {
                TransportError::AuthenticationFailed(format!("invalid value for {name}: {e}"))
            })?;
            request.headers_mut().insert(name, value);
        }
        Ok(request)
    }

    async fn connect(&self) -> TransportResult<()> {
        let request = self.handshake_request().await?;
        let connect_timeout = self.config.timeouts.connect;

        let (socket, _) = match tokio::time::timeout(connect_timeout, connect_async(request)).await
        {
            Ok(Ok(connected)) => connected,
            Ok(Err(e)) => {
                return Err(TransportError::ConnectionFailed(format!(
                    "WebSocket handshake with {} failed: {e}",
                    self.config.url
                )));
            }
            Err(_) => {
                return Err(TransportError::ConnectionFailed(format!(
                    "WebSocket handshake with {} timed out after {connect_timeout:?}",
                    self.config.url
                )));
            }
        };

        let (sink, stream) = socket.split();
        *self.writer.lock().await = Some(sink);
        *self.state.write().await = TransportState::Connected;

        let mut handles = self.task_handles.lock().await;
        handles.push(self.spawn_reader_task(stream));
        if let Some(interval) = self.config.ping_interval {
            handles.push(self.spawn_keep_alive_task(interval));
        }
        Ok(())
    }

    /// Entries registered after the reader failed everything would wait forever.
    async fn recheck(&self, id: &RequestId) -> TransportResult<()> {
        if let Err(e) = self.ensure_connected().await {
            self.pending.remove(id);
            return Err(e);
        }
        Ok(())
    }

    #[instrument(skip(self, request), fields(id = %request.id(), method = request.method(), session = %self.session_id))]
    async fn request(&self, request: Request) -> TransportResult<Response> {
        self.ensure_connected().await?;
        let text = codec::encode_request(&request)?;
        validate_request_size(text.len(), &self.config.limits)?;

        let id = request.id().clone();
        let (tx, rx) = oneshot::channel();
        self.register(&id, Pending::Unary(tx))?;
        let _guard = PendingGuard::new(&self.pending, id.clone());
        self.recheck(&id).await?;

        let started = Instant::now();
        self.write_text(text).await?;
        trace!("request written");

        match rx.await {
            Ok(Ok(response)) => {
                self.metrics.update_latency(started.elapsed());
                Ok(response)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(TransportError::ConnectionLost(
                "response channel closed".to_string(),
            )),
        }
    }

    #[instrument(skip(self, request), fields(id = %request.id(), method = request.method(), session = %self.session_id))]
    async fn request_stream(&self, request: Request) -> TransportResult<TransportStream> {
        self.ensure_connected().await?;
        let text = codec::encode_stream_request(&request)?;
        validate_request_size(text.len(), &self.config.limits)?;

        let id = request.id().clone();
        let (tx, rx) = mpsc::unbounded_channel();
        self.register(&id, Pending::Stream(tx))?;
        self.recheck(&id).await?;

        if let Err(e) = self.write_text(text).await {
            self.pending.remove(&id);
            return Err(e);
        }
        debug!("stream opened");
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

impl Transport for WebSocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    fn capabilities(&self) -> &TransportCapabilities {
        &self.capabilities
    }

    fn endpoint(&self) -> &str {
        &self.config.url
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
                            "cannot open a WebSocket transport that is {other}"
                        )));
                    }
                }
            }
            info!(url = %self.config.url, "Opening WebSocket session {}", self.session_id);
            self.metrics.connections.fetch_add(1, Ordering::Relaxed);

            match self.connect().await {
                Ok(()) => {
                    info!("WebSocket session {} connected", self.session_id);
                    Ok(())
                }
                Err(e) => {
                    warn!("WebSocket session {} failed to connect: {}", self.session_id, e);
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
        Box::pin(self.request(request))
    }

    fn send_stream(&self, request: Request) -> TransportFuture<'_, TransportStream> {
        Box::pin(self.request_stream(request))
    }

    fn cancel(&self, id: &RequestId) -> TransportFuture<'_, ()> {
        let id = id.clone();
        Box::pin(async move {
            // Forget locally first so nothing more is delivered for this id
            self.pending.remove(&id);

            if !self.state.read().await.is_connected() {
                debug!(%id, "transport not connected, cancel kept local");
                return Ok(());
            }
            self.write_text(codec::encode_cancel(&id)).await?;
            self.metrics
                .cancellations_sent
                .fetch_add(1, Ordering::Relaxed);
            debug!(%id, "cancel sent in session {}", self.session_id);
            Ok(())
        })
    }

    fn close(&self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            {
                let mut state = self.state.write().await;
                if matches!(*state, TransportState::Disconnected) {
                    return Ok(());
                }
                *state = TransportState::Disconnecting;
            }
            info!("Closing WebSocket session {}", self.session_id);

            let _ = self.shutdown_tx.send(());

            if let Some(mut writer) = self.writer.lock().await.take() {
                let _ = writer.send(Message::Close(None)).await;
                let _ = writer.close().await;
            }

            let handles: Vec<_> = self.task_handles.lock().await.drain(..).collect();
            for mut handle in handles {
                if tokio::time::timeout(TASK_SHUTDOWN_GRACE, &mut handle)
                    .await
                    .is_err()
                {
                    handle.abort();
                }
            }

            let failed = fail_all_pending(&self.pending, || TransportError::Closed);
            if failed > 0 {
                debug!(failed, "failed pending requests on close");
            }

            *self.state.write().await = TransportState::Disconnected;
            info!("WebSocket session {} closed", self.session_id);
            Ok(())
        })
    }
}
