//! Core transport trait.

use std::future::Future;
use std::pin::Pin;

use futures::Stream;
use mcpv2_types::{Request, RequestId, Response};

use crate::error::TransportResult;
use crate::metrics::TransportMetrics;
use crate::types::{TransportCapabilities, TransportKind, TransportState};

/// Boxed future returned by transport operations.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = TransportResult<T>> + Send + 'a>>;

/// Lazily produced responses for one streaming request.
///
/// The stream ends after the server's end-of-stream signal. An `Err` item is
/// terminal.
pub type TransportStream = Pin<Box<dyn Stream<Item = TransportResult<Response>> + Send>>;

/// The contract every wire transport implements.
///
/// A transport owns exactly one physical connection. It never reconnects on
/// its own: once the connection dies every pending request fails with
/// [`TransportError::ConnectionLost`](crate::TransportError::ConnectionLost)
/// and [`state`](Transport::state) reports `Failed`.
///
/// `send` futures must be cancel-safe. Dropping one abandons the request;
/// multiplexed transports forget the correlation entry so that a late
/// response is discarded.
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Which wire protocol this is.
    fn kind(&self) -> TransportKind;

    /// Returns the capabilities of this transport.
    fn capabilities(&self) -> &TransportCapabilities;

    /// Returns the endpoint address this transport talks to.
    fn endpoint(&self) -> &str;

    /// Returns the current state of the transport.
    fn state(&self) -> Pin<Box<dyn Future<Output = TransportState> + Send + '_>>;

    /// Returns a snapshot of the transport's counters.
    fn metrics(&self) -> TransportMetrics;

    /// Establishes the connection.
    fn open(&self) -> TransportFuture<'_, ()>;

    /// Sends one request and waits for its correlated response.
    fn send(&self, request: Request) -> TransportFuture<'_, Response>;

    /// Sends a streaming request and returns the responses as they arrive.
    fn send_stream(&self, request: Request) -> TransportFuture<'_, TransportStream>;

    /// Tells the server to stop work on `id` and forgets any local state for it.
    fn cancel(&self, id: &RequestId) -> TransportFuture<'_, ()>;

    /// Closes the connection. Closing twice is not an error.
    fn close(&self) -> TransportFuture<'_, ()>;

    /// Returns `true` if the transport is currently in the `Connected` state.
    fn is_connected(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move { self.state().await.is_connected() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Transport must stay object safe
    fn _test_transport_object(_t: &dyn Transport) {}
    fn _test_transport_arc(_t: std::sync::Arc<dyn Transport>) {}
}
