//! Loading client options from TOML, YAML and JSON files.

use std::io::Write;
use std::time::Duration;

use mcpv2_client::{ClientConfig, ClientOptions, ConfigError, create_client};
use mcpv2_transport_traits::TransportKind;
use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

fn write_config(extension: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(&format!(".{extension}"))
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_toml() {
    let file = write_config(
        "toml",
        r#"
transport_kind = "websocket"
endpoint = "ws://orchestrator:9000/mcp"
max_context_turns = 8
default_timeout_ms = 1500
ping_interval_ms = 10000

[headers]
x-tenant = "acme"

[limits]
max_request_size = 4096
"#,
    );

    let options = ClientOptions::from_file_with_prefix(file.path(), "MCPV2_TEST_TOML").unwrap();
    assert_eq!(options.transport_kind, TransportKind::WebSocket);
    assert_eq!(options.endpoint, "ws://orchestrator:9000/mcp");
    assert_eq!(options.max_context_turns, 8);
    assert_eq!(options.default_timeout, Duration::from_millis(1500));
    assert_eq!(options.ping_interval, Some(Duration::from_secs(10)));
    assert_eq!(options.headers["x-tenant"], "acme");
    assert_eq!(options.limits.max_request_size, Some(4096));
    // Untouched fields keep their defaults
    assert_eq!(options.connect_timeout, Duration::from_secs(10));
}

#[test]
fn test_load_yaml() {
    let file = write_config(
        "yaml",
        r#"
transport_kind: grpc
endpoint: "http://127.0.0.1:50051"
client_id: worker-3
session_id: session-9
"#,
    );

    let options = ClientOptions::from_file_with_prefix(file.path(), "MCPV2_TEST_YAML").unwrap();
    assert_eq!(options.transport_kind, TransportKind::Grpc);
    assert_eq!(options.client_id.as_deref(), Some("worker-3"));
    assert_eq!(options.session_id.as_deref(), Some("session-9"));

    let client = create_client(ClientConfig::new(options)).unwrap();
    assert_eq!(client.client_id(), "worker-3");
    assert_eq!(client.context().session_id(), "session-9");
}

#[test]
fn test_load_json() {
    let file = write_config(
        "json",
        r#"{"transport_kind": "http", "endpoint": "https://api.example.com/rpc", "health_check_path": "/health"}"#,
    );

    let options = ClientOptions::from_file_with_prefix(file.path(), "MCPV2_TEST_JSON").unwrap();
    assert_eq!(options.transport_kind, TransportKind::Http);
    assert_eq!(options.health_check_path.as_deref(), Some("/health"));
}

#[test]
fn test_env_overrides_file() {
    let file = write_config("toml", "endpoint = \"http://from-file/rpc\"\n");

    // SAFETY: the prefix is unique to this test, no other thread reads it
    unsafe {
        std::env::set_var("MCPV2_TEST_ENV__ENDPOINT", "http://from-env/rpc");
        std::env::set_var("MCPV2_TEST_ENV__MAX_CONTEXT_TURNS", "7");
    }
    let options = ClientOptions::from_file_with_prefix(file.path(), "MCPV2_TEST_ENV").unwrap();
    unsafe {
        std::env::remove_var("MCPV2_TEST_ENV__ENDPOINT");
        std::env::remove_var("MCPV2_TEST_ENV__MAX_CONTEXT_TURNS");
    }

    assert_eq!(options.endpoint, "http://from-env/rpc");
    assert_eq!(options.max_context_turns, 7);
}

#[test]
fn test_missing_file() {
    let err = ClientOptions::from_file("/definitely/not/here.toml").unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound(_)));
}

#[test]
fn test_unsupported_extension() {
    let file = write_config("ini", "endpoint=http://x/rpc\n");
    let err = ClientOptions::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat));
}

#[test]
fn test_invalid_values_rejected() {
    let file = write_config("toml", "max_context_turns = 0\n");
    let err = ClientOptions::from_file_with_prefix(file.path(), "MCPV2_TEST_INVALID").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn test_malformed_file() {
    let file = write_config("toml", "endpoint = [unterminated\n");
    let err = ClientOptions::from_file_with_prefix(file.path(), "MCPV2_TEST_BAD").unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)));
}
