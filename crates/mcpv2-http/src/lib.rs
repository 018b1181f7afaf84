//! # MCP v2 HTTP Transport
//!
//! HTTP JSON-RPC client transport for the MCP v2 client.
//!
//! ## Features
//!
//! - **One POST per request**: `{"id", "method", "params"}` in, response envelope out
//! - **Credential headers**: a `CredentialProvider` is consulted before every POST
//! - **Optional warmup**: `open()` can probe a health path before reporting ready
//! - **Size limits**: configurable request/response size validation
//! - **No streaming**: `send_stream` and `cancel` fail with `Unsupported`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mcpv2_http::{HttpTransport, HttpTransportConfig};
//! use mcpv2_transport_traits::Transport;
//! use mcpv2_types::Request;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = HttpTransport::new(HttpTransportConfig::new("http://localhost:8080/rpc"), None)?;
//!     transport.open().await?;
//!
//!     let response = transport.send(Request::new("echo", json!({"text": "hi"}))?).await?;
//!     println!("{:?}", response.result());
//!     Ok(())
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

mod transport;

pub use transport::{HttpTransport, HttpTransportConfig, PROTOCOL_VERSION_HEADER};
