//! Outgoing requests.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::Context;
use crate::error::{McpError, McpResult};
use crate::id::RequestId;

/// A validated request envelope.
///
/// Construction enforces that `method` is non-empty and `params` is a JSON
/// object, so a malformed request never reaches a transport. Fields are only
/// readable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireRequest")]
pub struct Request {
    id: RequestId,
    method: String,
    params: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<Arc<Context>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Map<String, Value>>,
}

/// Unvalidated request shape as it appears on the wire.
#[derive(Deserialize)]
struct WireRequest {
    id: RequestId,
    method: String,
    #[serde(default = "empty_object")]
    params: Value,
    #[serde(default)]
    context: Option<Arc<Context>>,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl TryFrom<WireRequest> for Request {
    type Error = McpError;

    fn try_from(wire: WireRequest) -> Result<Self, Self::Error> {
        let mut request = Self::with_id(wire.id, wire.method, wire.params)?;
        request.context = wire.context;
        request.metadata = wire.metadata;
        Ok(request)
    }
}

impl Request {
    /// Build a request with a fresh random id.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `method` is empty or `params` is not a JSON object.
    pub fn new(method: impl Into<String>, params: Value) -> McpResult<Self> {
        Self::with_id(RequestId::random(), method, params)
    }

    /// Build a request with a caller-chosen id.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `id` or `method` is empty or `params` is
    /// not a JSON object.
    pub fn with_id(
        id: impl Into<RequestId>,
        method: impl Into<String>,
        params: Value,
    ) -> McpResult<Self> {
        let id = id.into();
        let method = method.into();

        if id.as_str().trim().is_empty() {
            return Err(McpError::validation("request id must not be empty"));
        }
        if method.trim().is_empty() {
            return Err(
                McpError::validation("method must not be empty").with_request_id(id.as_str())
            );
        }
        let params = match params {
            Value::Object(map) => map,
            other => {
                return Err(McpError::validation(format!(
                    "params must be a JSON object, got {}",
                    json_type_name(&other)
                ))
                .with_request_id(id.as_str()));
            }
        };

        Ok(Self {
            id,
            method,
            params,
            context: None,
            metadata: None,
        })
    }

    /// Attach a context snapshot
    pub fn with_context(mut self, context: Arc<Context>) -> Self {
        self.context = Some(context);
        self
    }

    /// Replace the metadata object
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Set one metadata entry
    pub fn with_metadata_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    /// Correlation id
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Operation name
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Parameters object
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Attached context snapshot
    pub fn context(&self) -> Option<&Arc<Context>> {
        self.context.as_ref()
    }

    /// Request metadata
    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata.as_ref()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_valid_request() {
        let params = json!({"text": "hi"});
        let request = Request::with_id("r-1", "echo", params.clone()).unwrap();
        assert_eq!(request.id().as_str(), "r-1");
        assert_eq!(request.method(), "echo");
        assert_eq!(Value::Object(request.params().clone()), params);
    }

    #[test]
    fn test_rejects_empty_method() {
        for method in ["", "   "] {
            let err = Request::new(method, json!({})).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Validation);
        }
    }

    #[test]
    fn test_rejects_non_object_params() {
        for params in [json!(null), json!(1), json!("x"), json!(true), json!([1, 2])] {
            let err = Request::new("echo", params).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Validation);
            assert!(err.message.contains("JSON object"));
        }
    }

    #[test]
    fn test_wire_envelope() {
        let request = Request::with_id("r-7", "echo", json!({"text": "hi"}))
            .unwrap()
            .with_metadata_entry("client_id", json!("c-1"));
        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(
            wire,
            json!({
                "id": "r-7",
                "method": "echo",
                "params": {"text": "hi"},
                "metadata": {"client_id": "c-1"}
            })
        );
    }

    #[test]
    fn test_decoding_validates() {
        let ok: Request =
            serde_json::from_value(json!({"id": "a", "method": "m", "params": {}})).unwrap();
        assert_eq!(ok.method(), "m");

        let missing: Request = serde_json::from_value(json!({"id": "a", "method": "m"})).unwrap();
        assert!(missing.params().is_empty());

        let bad = serde_json::from_value::<Request>(json!({"id": "a", "method": "", "params": {}}));
        assert!(bad.is_err());
        let scalar = serde_json::from_value::<Request>(json!({"id": "a", "method": "m", "params": 3}));
        assert!(scalar.is_err());
    }
}
