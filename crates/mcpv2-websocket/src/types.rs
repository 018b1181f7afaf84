//! Core types and type aliases for the WebSocket transport.

use std::sync::Arc;

use dashmap::DashMap;
use futures::stream::{SplitSink, SplitStream};
use mcpv2_transport_traits::{
    AtomicMetrics, CredentialProvider, TransportCapabilities, TransportResult, TransportState,
};
use mcpv2_types::{RequestId, Response};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock, broadcast, mpsc, oneshot};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};
use tracing::debug;
use uuid::Uuid;

use crate::config::WebSocketConfig;

/// The underlying socket type
pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket writer handle for sending messages (thread-safe, async-safe)
pub(crate) type WebSocketWriter = Arc<Mutex<Option<SplitSink<WsStream, Message>>>>;

/// WebSocket reader half, owned by the reader task
pub(crate) type WebSocketReader = SplitStream<WsStream>;

/// In-flight requests keyed by request id
pub(crate) type PendingMap = Arc<DashMap<RequestId, Pending>>;

/// Where the response for an in-flight request goes.
#[derive(Debug)]
pub(crate) enum Pending {
    /// One response, then the entry is gone
    Unary(oneshot::Sender<TransportResult<Response>>),
    /// Any number of responses until the end-of-stream frame
    Stream(mpsc::UnboundedSender<TransportResult<Response>>),
}

impl Pending {
    /// Deliver a terminal error, consuming the entry
    pub(crate) fn fail(self, err: mcpv2_transport_traits::TransportError) {
        match self {
            Self::Unary(tx) => {
                let _ = tx.send(Err(err));
            }
            Self::Stream(tx) => {
                let _ = tx.send(Err(err));
            }
        }
    }
}

/// Removes a unary entry when the waiting future is dropped.
///
/// If the response already arrived the reader has removed the entry and
/// this is a no-op. Otherwise the request was abandoned and any late
/// response will find no entry and be discarded.
#[derive(Debug)]
pub(crate) struct PendingGuard {
    pending: PendingMap,
    id: RequestId,
}

impl PendingGuard {
    pub(crate) fn new(pending: &PendingMap, id: RequestId) -> Self {
        Self {
            pending: Arc::clone(pending),
            id,
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.pending.remove(&self.id).is_some() {
            debug!(id = %self.id, "abandoned pending request");
        }
    }
}

/// Multiplexed WebSocket transport.
///
/// Many requests share one socket. A single reader task routes every
/// inbound frame to its waiting caller by request id.
#[derive(Debug)]
pub struct WebSocketTransport {
    /// Transport state
    pub(crate) state: Arc<RwLock<TransportState>>,

    /// Transport capabilities
    pub(crate) capabilities: TransportCapabilities,

    /// Configuration
    pub(crate) config: WebSocketConfig,

    /// Handshake credentials
    pub(crate) credentials: Option<Arc<dyn CredentialProvider>>,

    /// Metrics collector
    pub(crate) metrics: Arc<AtomicMetrics>,

    /// WebSocket write half (sender)
    pub(crate) writer: WebSocketWriter,

    /// In-flight requests
    pub(crate) pending: PendingMap,

    /// Background task handles
    pub(crate) task_handles: Mutex<Vec<tokio::task::JoinHandle<()>>>,

    /// Shutdown signal broadcaster, one receiver per background task
    pub(crate) shutdown_tx: broadcast::Sender<()>,

    /// Session id used in log lines
    pub(crate) session_id: String,
}

impl WebSocketTransport {
    /// Create a transport. No I/O happens until [`open`](mcpv2_transport_traits::Transport::open).
    pub fn new(config: WebSocketConfig, credentials: Option<Arc<dyn CredentialProvider>>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let capabilities = TransportCapabilities {
            max_message_size: config.limits.max_response_size,
            ..TransportCapabilities::streaming()
        };

        Self {
            state: Arc::new(RwLock::new(TransportState::Disconnected)),
            capabilities,
            config,
            credentials,
            metrics: Arc::new(AtomicMetrics::default()),
            writer: Arc::new(Mutex::new(None)),
            pending: Arc::new(DashMap::new()),
            task_handles: Mutex::new(Vec::new()),
            shutdown_tx,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    /// Session id used to tag this transport's log lines
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Number of requests currently waiting for a response or stream item
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Fail and forget every in-flight request.
pub(crate) fn fail_all_pending(
    pending: &PendingMap,
    make_err: impl Fn() -> mcpv2_transport_traits::TransportError,
) -> usize {
    let ids: Vec<RequestId> = pending.iter().map(|entry| entry.key().clone()).collect();
    let mut failed = 0;
    for id in ids {
        if let Some((_, entry)) = pending.remove(&id) {
            entry.fail(make_err());
            failed += 1;
        }
    }
    failed
}
