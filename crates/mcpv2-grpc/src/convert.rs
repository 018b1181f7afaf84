//! Conversions between the shared request/response types and protobuf messages.
//!
//! JSON payloads are carried as UTF-8 JSON bytes.

use std::sync::Arc;

use mcpv2_types::{Context, ErrorObject, Payload, Request, RequestId, Response, ResponseMetadata};
use serde_json::{Map, Value};

use crate::error::{GrpcError, GrpcResult};
use crate::proto::{self, rpc_response::Outcome};

/// Encode a request for the `Invoke` / `InvokeStream` RPCs.
pub fn request_to_proto(request: &Request) -> GrpcResult<proto::RpcRequest> {
    Ok(proto::RpcRequest {
        id: request.id().to_string(),
        method: request.method().to_string(),
        params: serde_json::to_vec(request.params())?,
        context: request
            .context()
            .map(|ctx| serde_json::to_vec(ctx.as_ref()))
            .transpose()?,
        metadata: request.metadata().map(serde_json::to_vec).transpose()?,
    })
}

/// Decode a request message, validating it like any locally built request.
pub fn request_from_proto(message: proto::RpcRequest) -> GrpcResult<Request> {
    let params: Value = decode_json(&message.params, "params")?;
    let mut request = Request::with_id(message.id, message.method, params)
        .map_err(|e| GrpcError::InvalidRequest(e.message))?;

    if let Some(bytes) = message.context {
        let context: Context = decode_json(&bytes, "context")?;
        request = request.with_context(Arc::new(context));
    }
    if let Some(bytes) = message.metadata {
        let metadata: Map<String, Value> = decode_json(&bytes, "metadata")?;
        request = request.with_metadata(metadata);
    }
    Ok(request)
}

/// Encode a response message.
pub fn response_to_proto(response: &Response) -> GrpcResult<proto::RpcResponse> {
    let outcome = match &response.payload {
        Payload::Result(value) => Outcome::Result(serde_json::to_vec(value)?),
        Payload::Error(error) => Outcome::Error(error_to_proto(error)?),
    };
    let metadata = if response.metadata.is_empty() {
        None
    } else {
        Some(serde_json::to_vec(&response.metadata)?)
    };

    Ok(proto::RpcResponse {
        id: response.id.to_string(),
        outcome: Some(outcome),
        metadata,
    })
}

/// Decode a response message.
///
/// A message with no outcome becomes a `null` result flagged as a protocol
/// violation.
pub fn response_from_proto(message: proto::RpcResponse) -> GrpcResult<Response> {
    let (result, error) = match message.outcome {
        Some(Outcome::Result(bytes)) => (Some(decode_json::<Value>(&bytes, "result")?), None),
        Some(Outcome::Error(error)) => (None, Some(error_from_proto(error)?)),
        None => (None, None),
    };
    let metadata = match message.metadata {
        Some(bytes) => decode_json::<ResponseMetadata>(&bytes, "metadata")?,
        None => ResponseMetadata::default(),
    };

    Ok(Response::from_parts(
        RequestId::new(message.id),
        result,
        error,
        metadata,
    ))
}

fn error_to_proto(error: &ErrorObject) -> GrpcResult<proto::RpcError> {
    Ok(proto::RpcError {
        kind: error.kind.clone(),
        message: error.message.clone(),
        code: error.code,
        data: error.data.as_ref().map(serde_json::to_vec).transpose()?,
    })
}

fn error_from_proto(error: proto::RpcError) -> GrpcResult<ErrorObject> {
    Ok(ErrorObject {
        kind: error.kind,
        message: error.message,
        code: error.code,
        data: error
            .data
            .map(|bytes| decode_json::<Value>(&bytes, "error data"))
            .transpose()?,
    })
}

fn decode_json<T: serde::de::DeserializeOwned>(bytes: &[u8], field: &str) -> GrpcResult<T> {
    serde_json::from_slice(bytes).map_err(|e| GrpcError::decode(format!("invalid {field}: {e}")))
}
