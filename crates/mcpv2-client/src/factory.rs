//! Client and transport construction from options.
//!
//! Each transport is behind its cargo feature; asking for a kind that was
//! not compiled in fails with `UnsupportedOperation` instead of a build error.

use std::sync::Arc;

use mcpv2_transport_traits::{CredentialProvider, TimeoutConfig, Transport, TransportKind};
use mcpv2_types::{McpError, McpResult};
use tracing::debug;

use crate::client::Client;
use crate::config::{ClientConfig, ClientOptions};

/// Build a client and its transport from `config`. Performs no I/O.
///
/// # Errors
///
/// - `Validation` for invalid options
/// - `UnsupportedOperation` when the transport's feature is disabled
/// - `Connection` when the transport rejects its configuration
pub fn create_client(config: ClientConfig) -> McpResult<Client> {
    config.validate()?;
    let transport = create_transport(&config.options, config.credential_provider.clone())?;
    Client::new(config, transport)
}

/// Build the transport `options.transport_kind` names.
///
/// The client enforces per-call deadlines itself, so the transport gets no
/// request timeout of its own; only the connect timeout is passed down.
///
/// # Errors
///
/// See [`create_client`].
pub fn create_transport(
    options: &ClientOptions,
    credentials: Option<Arc<dyn CredentialProvider>>,
) -> McpResult<Arc<dyn Transport>> {
    let timeouts = TimeoutConfig {
        connect: options.connect_timeout,
        request: None,
    };
    debug!(kind = %options.transport_kind, endpoint = %options.endpoint, "creating transport");

    match options.transport_kind {
        #[cfg(feature = "http")]
        TransportKind::Http => {
            let config = mcpv2_http::HttpTransportConfig {
                timeouts,
                protocol_version: options.protocol_version.clone(),
                headers: options.headers.clone(),
                health_check_path: options.health_check_path.clone(),
                limits: options.limits.clone(),
                ..mcpv2_http::HttpTransportConfig::new(options.endpoint.clone())
            };
            let transport = mcpv2_http::HttpTransport::new(config, credentials)?;
            Ok(Arc::new(transport))
        }

        #[cfg(feature = "websocket")]
        TransportKind::WebSocket => {
            let config = mcpv2_websocket::WebSocketConfig {
                timeouts,
                ping_interval: options.ping_interval,
                limits: options.limits.clone(),
                headers: options.headers.clone(),
                ..mcpv2_websocket::WebSocketConfig::new(options.endpoint.clone())
            };
            Ok(Arc::new(mcpv2_websocket::WebSocketTransport::new(
                config,
                credentials,
            )))
        }

        #[cfg(feature = "grpc")]
        TransportKind::Grpc => {
            let config = mcpv2_grpc::GrpcConfig {
                timeouts,
                limits: options.limits.clone(),
                metadata: options.headers.clone(),
                ..mcpv2_grpc::GrpcConfig::new(options.endpoint.clone())
            };
            Ok(Arc::new(mcpv2_grpc::GrpcTransport::new(config, credentials)))
        }

        #[allow(unreachable_patterns)]
        kind => Err(McpError::unsupported(format!(
            "transport '{kind}' is not enabled; rebuild with the '{kind}' feature"
        ))
        .with_component("factory")),
    }
}
