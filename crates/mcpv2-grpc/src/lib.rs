//! MCP v2 gRPC Transport
//!
//! gRPC transport for the MCP v2 client, built on
//! [tonic](https://github.com/hyperium/tonic) over HTTP/2.
//!
//! # Service
//!
//! `proto/mcpv2.proto` defines `mcpv2.v1.McpService`:
//!
//! - `Invoke`: unary request/response
//! - `InvokeStream`: server-streaming; the stream completing is the end-of-stream signal
//! - `Cancel`: stop work on an in-flight request
//!
//! Params, context, result and metadata are JSON-encoded bytes; result and
//! error are a `oneof`. Status codes map into the shared transport errors
//! (see [`error::status_to_transport_error`]).
//!
//! # Quick Start
//!
//! ```ignore
//! use mcpv2_grpc::{GrpcConfig, GrpcTransport};
//! use mcpv2_transport_traits::Transport;
//!
//! let transport = GrpcTransport::new(GrpcConfig::new("http://[::1]:50051"), None);
//! transport.open().await?;
//! let response = transport.send(request).await?;
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

/// Generated protobuf types for MCP v2
pub mod proto {
    #![allow(missing_docs)]
    #![allow(unreachable_pub)]
    #![allow(missing_debug_implementations)]
    #![allow(clippy::all)]
    tonic::include_proto!("mcpv2.v1");
}

pub mod convert;
pub mod error;
mod transport;

// Re-exports for convenience
pub use error::{GrpcError, GrpcResult};
pub use transport::{GrpcConfig, GrpcTransport};
