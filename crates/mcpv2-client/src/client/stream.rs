//! Streaming responses.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use mcpv2_transport_traits::TransportStream;
use mcpv2_types::{McpError, McpResult, Request, RequestId, Response};
use parking_lot::Mutex;
use tracing::debug;

use super::core::{ClientInner, InFlight};
use crate::events::ClientEvent;

/// Items of one streaming call, in arrival order.
///
/// Each item's latency runs from the previous item, or from sending the
/// request for the first one.
///
/// The stream ends after the server's end-of-stream signal. An `Err` item
/// carrying a transport failure is the last item; remote error payloads are
/// yielded as `Err` items without ending the stream.
///
/// Calling [`cancel`](ResponseStream::cancel) or dropping the stream before
/// it ends sends exactly one cancel to the transport. Turns recorded from
/// items received so far stay in the session context.
pub struct ResponseStream {
    id: RequestId,
    items: Pin<Box<dyn Stream<Item = McpResult<Response>> + Send>>,
    control: Arc<StreamControl>,
    cancelled: bool,
}

/// Shared between the item generator, the stream handle and a drop-time cancel.
#[derive(Debug)]
struct StreamControl {
    client: Arc<ClientInner>,
    id: RequestId,
    settled: AtomicBool,
    in_flight: Mutex<Option<InFlight>>,
}

impl StreamControl {
    /// Mark the stream as finished. Returns `true` only for the first caller,
    /// which owns any cancel that has to be sent.
    fn settle(&self) -> bool {
        let first = !self.settled.swap(true, Ordering::AcqRel);
        if first {
            self.in_flight.lock().take();
        }
        first
    }

    async fn send_cancel(&self) -> McpResult<()> {
        self.client
            .transport
            .cancel(&self.id)
            .await
            .map_err(|e| McpError::from(e).with_request_id(self.id.as_str()))?;
        self.client.events.emit(ClientEvent::StreamCancelled {
            request_id: self.id.clone(),
        });
        Ok(())
    }
}

impl ResponseStream {
    pub(crate) fn new(
        client: Arc<ClientInner>,
        request: Request,
        stream: TransportStream,
        in_flight: InFlight,
        sent_at: DateTime<Utc>,
        started: Instant,
    ) -> Self {
        let id = request.id().clone();
        let control = Arc::new(StreamControl {
            client,
            id: id.clone(),
            settled: AtomicBool::new(false),
            in_flight: Mutex::new(Some(in_flight)),
        });

        let generator = Arc::clone(&control);
        let items = async_stream::stream! {
            let control = generator;
            let mut inner = stream;
            let mut last = started;
            loop {
                match inner.next().await {
                    Some(Ok(response)) => {
                        let latency = last.elapsed();
                        last = Instant::now();
                        yield control.client.complete(&request, response, sent_at, latency);
                    }
                    Some(Err(err)) => {
                        // A failure after cancel is expected noise
                        if control.settle() {
                            let method = request.method().to_string();
                            yield Err(control
                                .client
                                .transport_failure(request.id(), &method, err, "stream")
                                .await);
                        }
                        break;
                    }
                    None => {
                        control.settle();
                        break;
                    }
                }
            }
        };

        Self {
            id,
            items: Box::pin(items),
            control,
            cancelled: false,
        }
    }

    /// Id of the streaming request
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Whether the stream ended, failed or was cancelled
    pub fn is_finished(&self) -> bool {
        self.control.settled.load(Ordering::Acquire)
    }

    /// Stop the stream and tell the server.
    ///
    /// Does nothing if the stream already ended. After this call the stream
    /// yields no more items.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if the cancel could not be delivered.
    pub async fn cancel(&mut self) -> McpResult<()> {
        self.cancelled = true;
        if !self.control.settle() {
            return Ok(());
        }
        self.control.send_cancel().await
    }
}

impl Stream for ResponseStream {
    type Item = McpResult<Response>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancelled {
            return Poll::Ready(None);
        }
        self.items.as_mut().poll_next(cx)
    }
}

impl Drop for ResponseStream {
    fn drop(&mut self) {
        if !self.control.settle() {
            return;
        }
        let control = Arc::clone(&self.control);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = control.send_cancel().await {
                        debug!(id = %control.id, error = %e, "cancel for dropped stream failed");
                    }
                });
            }
            Err(_) => debug!(id = %self.id, "no runtime to cancel dropped stream"),
        }
    }
}

impl fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseStream")
            .field("id", &self.id)
            .field("finished", &self.is_finished())
            .field("cancelled", &self.cancelled)
            .finish()
    }
}
