//! Integration tests for the HTTP JSON-RPC transport against a wiremock server.

use std::sync::Arc;
use std::time::Duration;

use mcpv2_http::{HttpTransport, HttpTransportConfig};
use mcpv2_transport_traits::{
    StaticCredentials, TimeoutConfig, Transport, TransportError, TransportState,
};
use mcpv2_types::Request;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn open_transport(server: &MockServer) -> HttpTransport {
    let config = HttpTransportConfig::new(format!("{}/rpc", server.uri()));
    let transport = HttpTransport::new(config, None).unwrap();
    transport.open().await.unwrap();
    transport
}

#[tokio::test]
async fn test_post_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({
            "id": "X",
            "method": "echo",
            "params": {"text": "hi"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "X",
            "result": {"text": "hi"},
            "metadata": {"protocol_version": "2.0", "server_timing_ms": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let transport = open_transport(&server).await;
    let request = Request::with_id("X", "echo", json!({"text": "hi"})).unwrap();
    let response = transport.send(request).await.unwrap();

    assert_eq!(response.id.as_str(), "X");
    assert_eq!(response.result().unwrap()["text"], "hi");
    assert_eq!(response.metadata.server_timing_ms, Some(3));

    let metrics = transport.metrics();
    assert_eq!(metrics.requests_sent, 1);
    assert_eq!(metrics.responses_received, 1);
}

#[tokio::test]
async fn test_credentials_sent_on_every_post() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("authorization", "Bearer t0ken"))
        .and(header("x-tenant", "acme"))
        .and(header("x-static", "1"))
        .and(header("mcp-protocol-version", "2.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "a", "result": {}})))
        .expect(2)
        .mount(&server)
        .await;

    let creds = StaticCredentials::bearer("t0ken").with_header("x-tenant", "acme");
    let mut config = HttpTransportConfig::new(format!("{}/rpc", server.uri()));
    config.headers.insert("x-static".into(), "1".into());
    let transport = HttpTransport::new(config, Some(Arc::new(creds))).unwrap();
    transport.open().await.unwrap();

    transport
        .send(Request::with_id("a", "ping", json!({})).unwrap())
        .await
        .unwrap();
    transport
        .send(Request::with_id("a", "ping", json!({})).unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_error_envelope_is_returned_as_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "e1",
            "error": {"kind": "not_found", "message": "unknown method"}
        })))
        .mount(&server)
        .await;

    let transport = open_transport(&server).await;
    let response = transport
        .send(Request::with_id("e1", "nope", json!({})).unwrap())
        .await
        .unwrap();
    let error = response.error().unwrap();
    assert_eq!(error.kind, "not_found");
    assert_eq!(error.message, "unknown method");
}

#[tokio::test]
async fn test_http_status_without_envelope_is_remote_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let transport = open_transport(&server).await;
    let err = transport
        .send(Request::with_id("s1", "echo", json!({})).unwrap())
        .await
        .unwrap_err();
    assert!(
        matches!(&err, TransportError::Remote { kind, .. } if kind == "http_502"),
        "{err:?}"
    );
    // A server-side failure is not connection loss
    assert_eq!(transport.state().await, TransportState::Connected);
}

#[tokio::test]
async fn test_mismatched_id_is_protocol_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "other", "result": 1})))
        .mount(&server)
        .await;

    let transport = open_transport(&server).await;
    let err = transport
        .send(Request::with_id("mine", "echo", json!({})).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::ProtocolError(_)), "{err:?}");
}

#[tokio::test]
async fn test_streaming_is_unsupported() {
    let server = MockServer::start().await;
    let transport = open_transport(&server).await;

    let result = transport
        .send_stream(Request::new("count", json!({"to": 5})).unwrap())
        .await;
    assert!(matches!(result, Err(TransportError::Unsupported(_))));

    let result = transport.cancel(&"r-1".into()).await;
    assert!(matches!(result, Err(TransportError::Unsupported(_))));
}

#[tokio::test]
async fn test_send_before_open_fails() {
    let transport =
        HttpTransport::new(HttpTransportConfig::new("http://127.0.0.1:9/rpc"), None).unwrap();
    let err = transport
        .send(Request::new("echo", json!({})).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::NotConnected(_)), "{err:?}");
}

#[tokio::test]
async fn test_open_rejects_invalid_endpoint() {
    for endpoint in ["not a url", "ftp://example.test/rpc"] {
        let transport = HttpTransport::new(HttpTransportConfig::new(endpoint), None).unwrap();
        let err = transport.open().await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionFailed(_)), "{err:?}");
        assert_eq!(transport.state().await, TransportState::Disconnected);
    }
}

#[tokio::test]
async fn test_health_check_warmup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = HttpTransportConfig::new(format!("{}/rpc", server.uri()));
    config.health_check_path = Some("/health".into());
    let transport = HttpTransport::new(config, None).unwrap();
    transport.open().await.unwrap();
    assert!(transport.is_connected().await);

    let mut config = HttpTransportConfig::new(format!("{}/rpc", server.uri()));
    config.health_check_path = Some("/missing".into());
    let transport = HttpTransport::new(config, None).unwrap();
    let err = transport.open().await.unwrap_err();
    assert!(matches!(err, TransportError::ConnectionFailed(_)), "{err:?}");
}

#[tokio::test]
async fn test_unreachable_endpoint_marks_transport_failed() {
    // Reserve a port, then free it so nothing is listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport =
        HttpTransport::new(HttpTransportConfig::new(format!("http://{addr}/rpc")), None).unwrap();
    transport.open().await.unwrap();

    let err = transport
        .send(Request::new("echo", json!({})).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::ConnectionLost(_)), "{err:?}");
    assert!(matches!(transport.state().await, TransportState::Failed { .. }));

    // Transports never self-heal
    let err = transport
        .send(Request::new("echo", json!({})).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::ConnectionLost(_)), "{err:?}");
}

#[tokio::test]
async fn test_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": "slow", "result": {}}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let mut config = HttpTransportConfig::new(format!("{}/rpc", server.uri()));
    config.timeouts = TimeoutConfig {
        connect: Duration::from_secs(1),
        request: Some(Duration::from_millis(100)),
    };
    let transport = HttpTransport::new(config, None).unwrap();
    transport.open().await.unwrap();

    let err = transport
        .send(Request::with_id("slow", "echo", json!({})).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::RequestTimeout { .. }), "{err:?}");
    assert_eq!(transport.state().await, TransportState::Connected);
}

#[tokio::test]
async fn test_oversized_request_rejected_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = HttpTransportConfig::new(format!("{}/rpc", server.uri()));
    config.limits.max_request_size = Some(64);
    let transport = HttpTransport::new(config, None).unwrap();
    transport.open().await.unwrap();

    let big = "x".repeat(256);
    let err = transport
        .send(Request::new("echo", json!({"text": big})).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::RequestTooLarge { .. }), "{err:?}");
}
