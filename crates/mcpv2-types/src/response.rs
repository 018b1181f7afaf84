//! Incoming responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{McpError, McpResult};
use crate::id::RequestId;

/// A response correlated to exactly one request.
///
/// The `payload` holds either a result or an error, never both. A server that
/// sends both (or neither) still decodes, with [`Response::protocol_violation`]
/// describing what was wrong.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireResponse", from = "WireResponse")]
pub struct Response {
    /// Id of the request this answers
    pub id: RequestId,
    /// Result or error
    pub payload: Payload,
    /// Timing and protocol metadata
    pub metadata: ResponseMetadata,
    violation: Option<String>,
}

/// Either side of a response.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Method-specific result
    Result(Value),
    /// Server-reported error
    Error(ErrorObject),
}

/// Error object returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// Server-defined error kind
    #[serde(default = "unknown_kind")]
    pub kind: String,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
    /// Optional numeric code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    /// Optional structured detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

fn unknown_kind() -> String {
    "unknown".to_string()
}

impl ErrorObject {
    /// Create an error object
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            code: None,
            data: None,
        }
    }

    /// Set the numeric code
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    /// Set the structured detail
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Response metadata: protocol version, transport, timing and telemetry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Protocol version reported by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
    /// Server-side processing time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_timing_ms: Option<u64>,
    /// Transport that carried the exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    /// When the request left the client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    /// When the response arrived
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
    /// Caller telemetry, never interpreted by the client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_signals: Option<Map<String, Value>>,
    /// Any other fields the server sent
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResponseMetadata {
    /// Whether nothing is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Permissive response shape as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireResponse {
    id: RequestId,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ErrorObject>,
    #[serde(default, skip_serializing_if = "ResponseMetadata::is_empty")]
    metadata: ResponseMetadata,
}

/// Distinguishes `"result": null` from an absent `result` field.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl From<WireResponse> for Response {
    fn from(wire: WireResponse) -> Self {
        Self::from_parts(wire.id, wire.result, wire.error, wire.metadata)
    }
}

impl From<Response> for WireResponse {
    fn from(response: Response) -> Self {
        let (result, error) = match response.payload {
            Payload::Result(value) => (Some(value), None),
            Payload::Error(error) => (None, Some(error)),
        };
        Self {
            id: response.id,
            result,
            error,
            metadata: response.metadata,
        }
    }
}

impl Response {
    /// Assemble a response from independently decoded fields.
    ///
    /// When both `result` and `error` are present the error wins; when neither
    /// is, the result is `null`. Both cases are recorded as protocol violations
    /// and logged.
    pub fn from_parts(
        id: RequestId,
        result: Option<Value>,
        error: Option<ErrorObject>,
        metadata: ResponseMetadata,
    ) -> Self {
        // A null result beside an error object is an absent result
        let result = match (result, &error) {
            (Some(Value::Null), Some(_)) => None,
            (result, _) => result,
        };
        let (payload, violation) = match (result, error) {
            (Some(_), Some(error)) => (
                Payload::Error(error),
                Some("response carried both result and error".to_string()),
            ),
            (None, Some(error)) => (Payload::Error(error), None),
            (Some(result), None) => (Payload::Result(result), None),
            (None, None) => (
                Payload::Result(Value::Null),
                Some("response carried neither result nor error".to_string()),
            ),
        };
        if let Some(detail) = &violation {
            warn!(id = %id, detail = %detail, "protocol violation in response");
        }
        Self {
            id,
            payload,
            metadata,
            violation,
        }
    }

    /// A successful response
    pub fn success(id: impl Into<RequestId>, result: Value) -> Self {
        Self {
            id: id.into(),
            payload: Payload::Result(result),
            metadata: ResponseMetadata::default(),
            violation: None,
        }
    }

    /// An error response
    pub fn failure(id: impl Into<RequestId>, error: ErrorObject) -> Self {
        Self {
            id: id.into(),
            payload: Payload::Error(error),
            metadata: ResponseMetadata::default(),
            violation: None,
        }
    }

    /// Replace the metadata
    pub fn with_metadata(mut self, metadata: ResponseMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Whether this response carries an error
    pub fn is_error(&self) -> bool {
        matches!(self.payload, Payload::Error(_))
    }

    /// The result, if successful
    pub fn result(&self) -> Option<&Value> {
        match &self.payload {
            Payload::Result(value) => Some(value),
            Payload::Error(_) => None,
        }
    }

    /// The error, if any
    pub fn error(&self) -> Option<&ErrorObject> {
        match &self.payload {
            Payload::Error(error) => Some(error),
            Payload::Result(_) => None,
        }
    }

    /// Description of the protocol violation found while decoding, if any
    pub fn protocol_violation(&self) -> Option<&str> {
        self.violation.as_deref()
    }

    /// Keep a successful response, turning a server error into a remote error.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::remote`] when the payload is an error.
    pub fn error_for_remote(self) -> McpResult<Self> {
        match &self.payload {
            Payload::Result(_) => Ok(self),
            Payload::Error(error) => {
                Err(McpError::remote(error.clone()).with_request_id(self.id.as_str()))
            }
        }
    }

    /// Convert into the result value, mapping a server error into a remote error.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::remote`] when the payload is an error.
    pub fn into_result(self) -> McpResult<Value> {
        match self.payload {
            Payload::Result(value) => Ok(value),
            Payload::Error(error) => Err(McpError::remote(error).with_request_id(self.id.as_str())),
        }
    }
}
