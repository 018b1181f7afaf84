//! Background tasks for the WebSocket transport.
//!
//! The reader task is the single consumer of the socket. It routes every
//! frame to the pending entry with the same id and, when the socket dies,
//! fails everything still in flight. The keep-alive task sends periodic pings.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use futures::{SinkExt as _, StreamExt as _};
use mcpv2_transport_traits::{
    AtomicMetrics, Frame, LimitsConfig, TransportError, TransportState, codec,
    validate_response_size,
};
use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};

use crate::types::{
    Pending, PendingMap, WebSocketReader, WebSocketTransport, WebSocketWriter, fail_all_pending,
};

/// Everything the reader task needs, detached from the transport.
pub(crate) struct ReaderContext {
    pub(crate) session_id: String,
    pub(crate) pending: PendingMap,
    pub(crate) writer: WebSocketWriter,
    pub(crate) state: Arc<RwLock<TransportState>>,
    pub(crate) metrics: Arc<AtomicMetrics>,
    pub(crate) limits: LimitsConfig,
}

impl WebSocketTransport {
    /// Spawn the reader task that owns the read half of the socket
    pub(crate) fn spawn_reader_task(&self, reader: WebSocketReader) -> tokio::task::JoinHandle<()> {
        let ctx = ReaderContext {
            session_id: self.session_id.clone(),
            pending: Arc::clone(&self.pending),
            writer: Arc::clone(&self.writer),
            state: Arc::clone(&self.state),
            metrics: Arc::clone(&self.metrics),
            limits: self.config.limits.clone(),
        };
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut reader = reader;
            debug!("Message reader task started for session {}", ctx.session_id);

            let reason = loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Message reader received shutdown signal for session {}", ctx.session_id);
                        break None;
                    }

                    msg = reader.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            ctx.route(text.as_bytes());
                        }
                        Some(Ok(Message::Binary(data))) => {
                            ctx.route(&data);
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Some(ref mut writer) = *ctx.writer.lock().await
                                && writer.send(Message::Pong(data)).await.is_ok()
                            {
                                trace!("Message reader sent pong in session {}", ctx.session_id);
                            }
                        }
                        Some(Ok(Message::Pong(_))) => {
                            trace!("Message reader received pong in session {}", ctx.session_id);
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!("WebSocket closed by peer in session {}", ctx.session_id);
                            break Some(match frame {
                                Some(frame) => format!("server closed the connection: {}", frame.reason.as_str()),
                                None => "server closed the connection".to_string(),
                            });
                        }
                        Some(Ok(_)) => {
                            trace!("Message reader received other frame type in session {}", ctx.session_id);
                        }
                        Some(Err(e)) => {
                            error!("WebSocket error in session {}: {}", ctx.session_id, e);
                            break Some(e.to_string());
                        }
                        None => {
                            info!("WebSocket stream ended for session {}", ctx.session_id);
                            break Some("connection closed".to_string());
                        }
                    }
                }
            };

            if let Some(reason) = reason {
                ctx.connection_lost(reason).await;
            }
            debug!("Message reader task terminated for session {}", ctx.session_id);
        })
    }

    /// Spawn the keep-alive task that pings the server every `interval`
    pub(crate) fn spawn_keep_alive_task(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let writer = Arc::clone(&self.writer);
        let state = Arc::clone(&self.state);
        let session_id = self.session_id.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            let mut ping_count = 0u64;

            debug!(
                "Keep-alive task started for session {} with interval {:?}",
                session_id, interval
            );

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Keep-alive task received shutdown signal for session {}", session_id);
                        break;
                    }

                    _ = ticker.tick() => {
                        if !state.read().await.is_connected() {
                            break;
                        }

                        if let Some(ref mut w) = *writer.lock().await {
                            ping_count += 1;
                            let payload = format!("ping-{ping_count}");
                            match w.send(Message::Ping(payload.into_bytes().into())).await {
                                Ok(()) => trace!("Keep-alive ping {} sent for session {}", ping_count, session_id),
                                // The reader notices the dead socket and fails pending requests
                                Err(e) => warn!("Keep-alive ping failed for session {}: {}", session_id, e),
                            }
                        }
                    }
                }
            }

            debug!("Keep-alive task terminated for session {}", session_id);
        })
    }
}

impl ReaderContext {
    /// Deliver one inbound frame to whoever is waiting for its id.
    fn route(&self, bytes: &[u8]) {
        let frame = match codec::decode_frame(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Discarding undecodable frame in session {}: {}", self.session_id, e);
                return;
            }
        };

        let id = frame.id().clone();
        if !self.pending.contains_key(&id) {
            self.metrics
                .responses_discarded
                .fetch_add(1, Ordering::Relaxed);
            debug!(
                %id,
                "Discarding frame for abandoned or unknown request in session {}", self.session_id
            );
            return;
        }

        match frame {
            Frame::EndOfStream(id) => {
                if let Some((_, entry)) = self.pending.remove(&id) {
                    match entry {
                        Pending::Stream(_) => trace!(%id, "stream complete"),
                        Pending::Unary(tx) => {
                            let _ = tx.send(Err(TransportError::ProtocolError(format!(
                                "end-of-stream marker for unary request {id}"
                            ))));
                        }
                    }
                }
            }
            Frame::Response(response) => {
                self.metrics.record_received(bytes.len());
                let size_check = validate_response_size(bytes.len(), &self.limits);

                // Unary entries are consumed by their only response
                if let Some((_, Pending::Unary(tx))) = self
                    .pending
                    .remove_if(&id, |_, entry| matches!(entry, Pending::Unary(_)))
                {
                    let _ = tx.send(size_check.map(|()| response));
                    return;
                }

                let item = if self.limits.enforce_on_streams {
                    size_check.map(|()| response)
                } else {
                    Ok(response)
                };

                let delivered = match self.pending.get(&id).as_deref() {
                    Some(Pending::Stream(tx)) => tx.send(item).is_ok(),
                    _ => true,
                };
                if !delivered {
                    // Consumer dropped the stream without cancelling
                    self.pending.remove(&id);
                    debug!(%id, "stream consumer gone, dropping entry");
                }
            }
        }
    }

    /// Mark the transport failed and fail everything in flight.
    async fn connection_lost(&self, reason: String) {
        {
            let mut state = self.state.write().await;
            if !state.is_connected() {
                // close() is already tearing things down
                return;
            }
            *state = TransportState::Failed {
                reason: reason.clone(),
            };
        }
        self.writer.lock().await.take();

        let failed = fail_all_pending(&self.pending, || {
            TransportError::ConnectionLost(reason.clone())
        });
        warn!(
            failed,
            "Connection lost for session {}: {}", self.session_id, reason
        );
    }
}
