//! Integration tests for the gRPC transport against an in-process tonic server.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{Stream, StreamExt};
use mcpv2_grpc::proto::mcp_service_server::{McpService, McpServiceServer};
use mcpv2_grpc::proto::{CancelRequest, CancelResponse, RpcRequest, RpcResponse};
use mcpv2_grpc::{GrpcConfig, GrpcTransport, convert};
use mcpv2_transport_traits::{
    LimitsConfig, StaticCredentials, TimeoutConfig, Transport, TransportError, TransportState,
};
use mcpv2_types::{ErrorObject, Request, Response};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Request as RpcCall, Response as RpcReply, Status};

#[derive(Debug, Default, Clone)]
struct TestService {
    cancels: Arc<Mutex<Vec<String>>>,
    authorization: Arc<Mutex<Option<String>>>,
}

fn reply(response: &Response) -> Result<RpcReply<RpcResponse>, Status> {
    Ok(RpcReply::new(convert::response_to_proto(response).unwrap()))
}

#[tonic::async_trait]
impl McpService for TestService {
    async fn invoke(&self, call: RpcCall<RpcRequest>) -> Result<RpcReply<RpcResponse>, Status> {
        let auth = call
            .metadata()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        *self.authorization.lock().unwrap() = auth;

        let request = convert::request_from_proto(call.into_inner())
            .map_err(|e| Status::invalid_argument(e.to_string()))?;
        let id = request.id().clone();
        match request.method() {
            "echo" => reply(&Response::success(id, Value::Object(request.params().clone()))),
            "error" => reply(&Response::failure(
                id,
                ErrorObject::new("not_found", "no such tool").with_code(-32601),
            )),
            "slow" => {
                tokio::time::sleep(Duration::from_millis(500)).await;
                reply(&Response::success(id, json!({})))
            }
            "invalid" => Err(Status::invalid_argument("bad params")),
            "down" => Err(Status::unavailable("server going away")),
            _ => Err(Status::unimplemented("no such method")),
        }
    }

    type InvokeStreamStream = Pin<Box<dyn Stream<Item = Result<RpcResponse, Status>> + Send>>;

    async fn invoke_stream(
        &self,
        call: RpcCall<RpcRequest>,
    ) -> Result<RpcReply<Self::InvokeStreamStream>, Status> {
        let request = convert::request_from_proto(call.into_inner())
            .map_err(|e| Status::invalid_argument(e.to_string()))?;
        let id = request.id().clone();
        let to = request.params().get("to").and_then(Value::as_u64);
        let blob = request.params().get("blob").and_then(Value::as_u64);

        let stream = async_stream::stream! {
            if let Some(size) = blob {
                let blob = "x".repeat(size as usize);
                yield Ok(convert::response_to_proto(&Response::success(id.clone(), json!({"blob": blob}))).unwrap());
                return;
            }
            let mut n = 0u64;
            loop {
                n += 1;
                if to.is_some_and(|to| n > to) {
                    break;
                }
                yield Ok(convert::response_to_proto(&Response::success(id.clone(), json!({"n": n}))).unwrap());
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        Ok(RpcReply::new(Box::pin(stream)))
    }

    async fn cancel(&self, call: RpcCall<CancelRequest>) -> Result<RpcReply<CancelResponse>, Status> {
        self.cancels.lock().unwrap().push(call.into_inner().id);
        Ok(RpcReply::new(CancelResponse { cancelled: true }))
    }
}

async fn start(service: TestService) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(
        Server::builder()
            .add_service(McpServiceServer::new(service))
            .serve_with_incoming(TcpListenerStream::new(listener)),
    );
    format!("http://{addr}")
}

async fn connect(endpoint: String) -> GrpcTransport {
    let transport = GrpcTransport::new(GrpcConfig::new(endpoint), None);
    transport.open().await.unwrap();
    transport
}

#[tokio::test]
async fn test_unary_round_trip_with_credentials() {
    let service = TestService::default();
    let endpoint = start(service.clone()).await;

    let credentials = Arc::new(StaticCredentials::bearer("t0ken"));
    let transport = GrpcTransport::new(GrpcConfig::new(endpoint), Some(credentials));
    transport.open().await.unwrap();

    let request = Request::with_id("g-1", "echo", json!({"text": "hi"})).unwrap();
    let response = transport.send(request).await.unwrap();

    assert_eq!(response.id.as_str(), "g-1");
    assert_eq!(response.result(), Some(&json!({"text": "hi"})));
    assert_eq!(
        service.authorization.lock().unwrap().as_deref(),
        Some("Bearer t0ken")
    );
    assert_eq!(transport.metrics().requests_sent, 1);
}

#[tokio::test]
async fn test_error_payload_is_a_response() {
    let endpoint = start(TestService::default()).await;
    let transport = connect(endpoint).await;

    let response = transport
        .send(Request::with_id("g-2", "error", json!({})).unwrap())
        .await
        .unwrap();
    let error = response.error().unwrap();
    assert_eq!(error.kind, "not_found");
    assert_eq!(error.code, Some(-32601));
}

#[tokio::test]
async fn test_status_codes_map_to_taxonomy() {
    let endpoint = start(TestService::default()).await;
    let transport = connect(endpoint).await;

    let err = transport
        .send(Request::new("invalid", json!({})).unwrap())
        .await
        .unwrap_err();
    assert!(
        matches!(&err, TransportError::Remote { kind, .. } if kind == "invalid_argument"),
        "{err:?}"
    );

    let err = transport
        .send(Request::new("nope", json!({})).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Unsupported(_)), "{err:?}");

    // Neither is connection loss
    assert_eq!(transport.state().await, TransportState::Connected);
}

#[tokio::test]
async fn test_unavailable_marks_transport_failed() {
    let endpoint = start(TestService::default()).await;
    let transport = connect(endpoint).await;

    let err = transport
        .send(Request::new("down", json!({})).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::ConnectionLost(_)), "{err:?}");
    assert!(matches!(
        transport.state().await,
        TransportState::Failed { .. }
    ));

    let err = transport
        .send(Request::new("echo", json!({})).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::ConnectionLost(_)), "{err:?}");
}

#[tokio::test]
async fn test_server_stream_ends_on_completion() {
    let endpoint = start(TestService::default()).await;
    let transport = connect(endpoint).await;

    let request = Request::with_id("g-s", "count", json!({"to": 3})).unwrap();
    let items: Vec<u64> = transport
        .send_stream(request)
        .await
        .unwrap()
        .map(|item| item.unwrap().result().unwrap()["n"].as_u64().unwrap())
        .collect()
        .await;

    assert_eq!(items, vec![1, 2, 3]);
    assert_eq!(transport.active_stream_count(), 0);
}

/// Stream one item with a 2KB result under a 512-byte response limit.
async fn stream_oversized_item(endpoint: String, enforce_on_streams: bool) -> Result<usize, TransportError> {
    let mut config = GrpcConfig::new(endpoint);
    config.limits = LimitsConfig {
        max_response_size: Some(512),
        max_request_size: None,
        enforce_on_streams,
    };
    let transport = GrpcTransport::new(config, None);
    transport.open().await.unwrap();

    let request = Request::with_id("g-big", "dump", json!({"blob": 2048})).unwrap();
    let mut stream = transport.send_stream(request).await.unwrap();
    let item = stream.next().await.unwrap();
    item.map(|response| response.result().unwrap()["blob"].as_str().unwrap().len())
}

#[tokio::test]
async fn test_stream_item_size_limit_follows_config() {
    let endpoint = start(TestService::default()).await;

    assert!(stream_oversized_item(endpoint.clone(), true).await.is_err());
    assert_eq!(stream_oversized_item(endpoint, false).await.unwrap(), 2048);
}

#[tokio::test]
async fn test_cancel_stops_stream_and_calls_server() {
    let service = TestService::default();
    let endpoint = start(service.clone()).await;
    let transport = connect(endpoint).await;

    let request = Request::with_id("g-c", "count", json!({})).unwrap();
    let mut stream = transport.send_stream(request).await.unwrap();
    for expected in 1..=2u64 {
        let item = stream.next().await.unwrap().unwrap();
        assert_eq!(item.result().unwrap()["n"], expected);
    }
    assert_eq!(transport.active_stream_count(), 1);

    transport.cancel(&"g-c".into()).await.unwrap();

    assert!(stream.next().await.is_none());
    assert_eq!(service.cancels.lock().unwrap().as_slice(), ["g-c".to_string()]);
    assert_eq!(transport.metrics().cancellations_sent, 1);
}

#[tokio::test]
async fn test_request_timeout() {
    let endpoint = start(TestService::default()).await;
    let mut config = GrpcConfig::new(endpoint);
    config.timeouts = TimeoutConfig {
        connect: Duration::from_secs(1),
        request: Some(Duration::from_millis(100)),
    };
    let transport = GrpcTransport::new(config, None);
    transport.open().await.unwrap();

    let err = transport
        .send(Request::new("slow", json!({})).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::RequestTimeout { .. }), "{err:?}");
    assert_eq!(transport.state().await, TransportState::Connected);
}

#[tokio::test]
async fn test_open_failures() {
    let transport = GrpcTransport::new(GrpcConfig::new("not a uri"), None);
    let err = transport.open().await.unwrap_err();
    assert!(matches!(err, TransportError::ConnectionFailed(_)), "{err:?}");

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = GrpcTransport::new(GrpcConfig::new(format!("http://{addr}")), None);
    let err = transport.open().await.unwrap_err();
    assert!(matches!(err, TransportError::ConnectionFailed(_)), "{err:?}");
    assert_eq!(transport.state().await, TransportState::Disconnected);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let endpoint = start(TestService::default()).await;
    let transport = connect(endpoint).await;

    transport.close().await.unwrap();
    transport.close().await.unwrap();
    assert_eq!(transport.state().await, TransportState::Disconnected);

    let err = transport
        .send(Request::new("echo", json!({})).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::NotConnected(_)), "{err:?}");
}
