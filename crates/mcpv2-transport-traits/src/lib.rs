//! # MCP v2 Transport Traits
//!
//! The contract shared by the HTTP, WebSocket and gRPC transports of the MCP v2 client.
//!
//! ## Overview
//!
//! This crate defines:
//! - **Traits**: [`Transport`], [`CredentialProvider`]
//! - **Types**: [`TransportKind`], [`TransportState`], [`TransportCapabilities`], [`TransportStream`]
//! - **Errors**: [`TransportError`], [`TransportResult`], mapped into `McpError`
//! - **Codec**: the JSON envelope used by the HTTP and WebSocket transports
//! - **Config**: [`LimitsConfig`], [`TimeoutConfig`]
//! - **Metrics**: [`TransportMetrics`], [`AtomicMetrics`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mcpv2_transport_traits::{Transport, TransportFuture};
//!
//! #[derive(Debug)]
//! struct MyTransport { /* ... */ }
//!
//! impl Transport for MyTransport {
//!     fn send(&self, request: Request) -> TransportFuture<'_, Response> {
//!         Box::pin(async move { /* ... */ })
//!     }
//!     // ... other trait methods
//! }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::must_use_candidate
)]

pub mod codec;
mod config;
mod credentials;
mod error;
mod metrics;
mod traits;
mod types;

// Re-export all public items
pub use codec::Frame;
pub use config::{DEFAULT_MAX_MESSAGE_SIZE, LimitsConfig, TimeoutConfig};
pub use credentials::{CredentialProvider, StaticCredentials};
pub use error::{TransportError, TransportResult};
pub use metrics::{AtomicMetrics, TransportMetrics};
pub use traits::{Transport, TransportFuture, TransportStream};
pub use types::{TransportCapabilities, TransportKind, TransportState};

// Re-export validation functions
pub use error::{validate_request_size, validate_response_size};
