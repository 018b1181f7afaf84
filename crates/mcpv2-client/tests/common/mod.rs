//! Scriptable in-memory transport shared by the client integration tests.

#![allow(dead_code, unreachable_pub)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use mcpv2_client::{Client, ClientBuilder};
use mcpv2_transport_traits::{
    AtomicMetrics, Transport, TransportCapabilities, TransportError, TransportFuture,
    TransportKind, TransportMetrics, TransportState, TransportStream,
};
use mcpv2_types::{ErrorObject, Request, RequestId, Response, ResponseMetadata};
use parking_lot::Mutex;
use serde_json::{Value, json};

/// How the mock answers one method.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Echo the params back as the result (the default)
    Echo,
    /// Fixed result
    Result(Value),
    /// Server error object
    Error(ErrorObject),
    /// Raw result and error fields, as a decoder would see them
    Parts(Option<Value>, Option<ErrorObject>),
    /// Answer after a delay
    Delayed(Duration, Box<Reply>),
    /// The connection dies
    ConnectionLost(String),
}

/// One item of a scripted stream.
#[derive(Debug, Clone)]
pub enum StreamItem {
    Result(Value),
    Error(ErrorObject),
    ConnectionLost(String),
}

#[derive(Debug)]
pub struct MockTransport {
    kind: TransportKind,
    capabilities: TransportCapabilities,
    state: Mutex<TransportState>,
    replies: Mutex<HashMap<String, Reply>>,
    stream_items: Mutex<Vec<StreamItem>>,
    item_delay: Mutex<Duration>,
    open_delay: Mutex<Duration>,
    fail_open: AtomicBool,
    metrics: AtomicMetrics,
    pub sent: Mutex<Vec<Request>>,
    pub cancelled: Mutex<Vec<RequestId>>,
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
}

impl MockTransport {
    /// A streaming-capable mock that echoes every call
    pub fn streaming() -> Arc<Self> {
        Arc::new(Self::with_capabilities(
            TransportKind::WebSocket,
            TransportCapabilities::streaming(),
        ))
    }

    /// A request/response-only mock
    pub fn unary() -> Arc<Self> {
        Arc::new(Self::with_capabilities(
            TransportKind::Http,
            TransportCapabilities::unary(),
        ))
    }

    fn with_capabilities(kind: TransportKind, capabilities: TransportCapabilities) -> Self {
        Self {
            kind,
            capabilities,
            state: Mutex::new(TransportState::Disconnected),
            replies: Mutex::new(HashMap::new()),
            stream_items: Mutex::new(Vec::new()),
            item_delay: Mutex::new(Duration::from_millis(5)),
            open_delay: Mutex::new(Duration::ZERO),
            fail_open: AtomicBool::new(false),
            metrics: AtomicMetrics::new(),
            sent: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }
    }

    pub fn reply(&self, method: &str, reply: Reply) {
        self.replies.lock().insert(method.to_string(), reply);
    }

    pub fn stream_results(&self, count: usize) {
        *self.stream_items.lock() = (1..=count)
            .map(|index| StreamItem::Result(json!({"index": index})))
            .collect();
    }

    pub fn stream_script(&self, items: Vec<StreamItem>) {
        *self.stream_items.lock() = items;
    }

    pub fn item_delay(&self, delay: Duration) {
        *self.item_delay.lock() = delay;
    }

    /// Delay before `send_stream` hands back the stream
    pub fn stream_open_delay(&self, delay: Duration) {
        *self.open_delay.lock() = delay;
    }

    pub fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn cancel_count(&self) -> usize {
        self.cancelled.lock().len()
    }

    pub fn last_sent(&self) -> Request {
        self.sent.lock().last().cloned().expect("nothing sent")
    }

    fn die(&self, reason: &str) -> TransportError {
        *self.state.lock() = TransportState::Failed {
            reason: reason.to_string(),
        };
        TransportError::ConnectionLost(reason.to_string())
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        match &*self.state.lock() {
            TransportState::Connected => Ok(()),
            TransportState::Failed { reason } => Err(TransportError::ConnectionLost(reason.clone())),
            other => Err(TransportError::NotConnected(other.to_string())),
        }
    }

    async fn answer(&self, request: &Request, mut reply: Reply) -> Result<Response, TransportError> {
        while let Reply::Delayed(delay, inner) = reply {
            tokio::time::sleep(delay).await;
            reply = *inner;
        }
        let id = request.id().clone();
        match reply {
            Reply::Echo => Ok(Response::success(id, Value::Object(request.params().clone()))),
            Reply::Result(value) => Ok(Response::success(id, value)),
            Reply::Error(error) => Ok(Response::failure(id, error)),
            Reply::Parts(result, error) => Ok(Response::from_parts(
                id,
                result,
                error,
                ResponseMetadata::default(),
            )),
            Reply::ConnectionLost(reason) => Err(self.die(&reason)),
            Reply::Delayed(..) => unreachable!(),
        }
    }
}

impl Transport for MockTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn capabilities(&self) -> &TransportCapabilities {
        &self.capabilities
    }

    fn endpoint(&self) -> &str {
        "mock://orchestrator"
    }

    fn state(&self) -> std::pin::Pin<Box<dyn Future<Output = TransportState> + Send + '_>> {
        Box::pin(async move { self.state.lock().clone() })
    }

    fn metrics(&self) -> TransportMetrics {
        self.metrics.snapshot()
    }

    fn open(&self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.fail_open.load(Ordering::SeqCst) {
                return Err(TransportError::ConnectionFailed("connection refused".into()));
            }
            *self.state.lock() = TransportState::Connected;
            Ok(())
        })
    }

    fn send(&self, request: Request) -> TransportFuture<'_, Response> {
        Box::pin(async move {
            self.ensure_connected()?;
            self.sent.lock().push(request.clone());
            self.metrics.record_sent(0);
            let reply = self
                .replies
                .lock()
                .get(request.method())
                .cloned()
                .unwrap_or(Reply::Echo);
            let response = self.answer(&request, reply).await?;
            self.metrics.record_received(0);
            Ok(response)
        })
    }

    fn send_stream(&self, request: Request) -> TransportFuture<'_, TransportStream> {
        Box::pin(async move {
            if !self.capabilities.supports_streaming {
                return Err(TransportError::Unsupported("no streaming".into()));
            }
            self.ensure_connected()?;
            self.sent.lock().push(request.clone());
            let open_delay = *self.open_delay.lock();
            tokio::time::sleep(open_delay).await;

            let items = self.stream_items.lock().clone();
            let delay = *self.item_delay.lock();
            let id = request.id().clone();
            let stream = async_stream::stream! {
                for item in items {
                    tokio::time::sleep(delay).await;
                    match item {
                        StreamItem::Result(value) => yield Ok(Response::success(id.clone(), value)),
                        StreamItem::Error(error) => yield Ok(Response::failure(id.clone(), error)),
                        StreamItem::ConnectionLost(reason) => {
                            yield Err(TransportError::ConnectionLost(reason));
                            break;
                        }
                    }
                }
            };
            let stream: TransportStream = Box::pin(stream);
            Ok(stream)
        })
    }

    fn cancel(&self, id: &RequestId) -> TransportFuture<'_, ()> {
        let id = id.clone();
        Box::pin(async move {
            self.cancelled.lock().push(id);
            Ok(())
        })
    }

    fn close(&self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.closes.fetch_add(1, Ordering::SeqCst);
            *self.state.lock() = TransportState::Disconnected;
            Ok(())
        })
    }
}

/// Route client logs to the test output; `RUST_LOG=mcpv2_client=debug` to see them
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Connected client over `transport`
pub async fn connected_client(transport: Arc<MockTransport>) -> Client {
    builder(transport).connect().await.unwrap()
}

/// Builder over `transport` with a short default timeout
pub fn builder(transport: Arc<MockTransport>) -> ClientBuilder {
    init_tracing();
    ClientBuilder::new()
        .with_transport(transport)
        .with_timeout(Duration::from_secs(2))
}

/// Drain every event received so far
pub fn drain<T: Clone>(rx: &mut tokio::sync::broadcast::Receiver<T>) -> Vec<T> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
