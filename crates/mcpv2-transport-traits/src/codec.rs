//! JSON envelope codec shared by the HTTP and WebSocket transports.
//!
//! Request: `{"id", "method", "params"[, "context"][, "metadata"][, "stream"]}`
//! Response: `{"id", "result"}` or `{"id", "error": {"kind", "message"}}`
//! End of stream: `{"id", "end": true}`
//! Cancel: `{"id", "cancel": true}`

use mcpv2_types::{Request, RequestId, Response};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{TransportError, TransportResult};

/// One decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A response (or stream item) for a pending request
    Response(Response),
    /// The server finished streaming for this id
    EndOfStream(RequestId),
}

impl Frame {
    /// Id the frame belongs to
    pub fn id(&self) -> &RequestId {
        match self {
            Self::Response(response) => &response.id,
            Self::EndOfStream(id) => id,
        }
    }
}

/// Encode a unary request envelope.
///
/// # Errors
///
/// Returns [`TransportError::SerializationFailed`] if the request cannot be serialized.
pub fn encode_request(request: &Request) -> TransportResult<String> {
    Ok(serde_json::to_string(request)?)
}

/// Encode a request envelope flagged as streaming.
///
/// # Errors
///
/// Returns [`TransportError::SerializationFailed`] if the request cannot be serialized.
pub fn encode_stream_request(request: &Request) -> TransportResult<String> {
    let mut value = serde_json::to_value(request)?;
    if let Value::Object(map) = &mut value {
        map.insert("stream".to_string(), Value::Bool(true));
    }
    Ok(serde_json::to_string(&value)?)
}

/// Encode a cancel signal for `id`.
pub fn encode_cancel(id: &RequestId) -> String {
    serde_json::json!({ "id": id, "cancel": true }).to_string()
}

/// Decode a single response envelope.
///
/// # Errors
///
/// Returns [`TransportError::ProtocolError`] for anything that is not a
/// response envelope, including an end-of-stream marker.
pub fn decode_response(bytes: &[u8]) -> TransportResult<Response> {
    match decode_frame(bytes)? {
        Frame::Response(response) => Ok(response),
        Frame::EndOfStream(id) => {
            warn!(%id, "end-of-stream marker in reply to a unary request");
            Err(TransportError::ProtocolError(format!(
                "unexpected end-of-stream marker for unary request {id}"
            )))
        }
    }
}

/// Decode one inbound frame.
///
/// # Errors
///
/// Returns [`TransportError::ProtocolError`] when the payload is not a JSON
/// object with a string `id`.
pub fn decode_frame(bytes: &[u8]) -> TransportResult<Frame> {
    parse_frame(bytes)
        .inspect_err(|e| debug!(len = bytes.len(), error = %e, "rejected inbound frame"))
}

fn parse_frame(bytes: &[u8]) -> TransportResult<Frame> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| TransportError::ProtocolError(format!("invalid JSON frame: {e}")))?;

    let Value::Object(map) = &value else {
        return Err(TransportError::ProtocolError(
            "frame is not a JSON object".to_string(),
        ));
    };
    let Some(id) = map.get("id").and_then(Value::as_str) else {
        return Err(TransportError::ProtocolError(
            "frame has no string id".to_string(),
        ));
    };

    if map.get("end").and_then(Value::as_bool) == Some(true) {
        return Ok(Frame::EndOfStream(RequestId::new(id)));
    }

    serde_json::from_value(value)
        .map(Frame::Response)
        .map_err(|e| TransportError::ProtocolError(format!("malformed response envelope: {e}")))
}
