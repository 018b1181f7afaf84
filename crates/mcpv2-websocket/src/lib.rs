//! # MCP v2 WebSocket Transport
//!
//! A single persistent WebSocket connection carrying many concurrent
//! requests. Every frame is a JSON text message:
//!
//! - request: `{"id", "method", "params", ...}` (`"stream": true` for streaming calls)
//! - response or stream item: `{"id", "result"}` / `{"id", "error"}`
//! - end of stream: `{"id", "end": true}`
//! - cancel: `{"id", "cancel": true}`
//!
//! Responses may arrive in any order; they are matched to callers by id.
//! Credentials are sent once, as headers on the opening handshake.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mcpv2_transport_traits::Transport;
//! use mcpv2_websocket::{WebSocketConfig, WebSocketTransport};
//!
//! let transport = WebSocketTransport::new(WebSocketConfig::new("ws://localhost:8080/mcp"), None);
//! transport.open().await?;
//! let response = transport.send(request).await?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! mcpv2-websocket/
//! ├── config.rs     # WebSocketConfig
//! ├── types.rs      # Transport struct, pending-request table
//! ├── tasks.rs      # Reader and keep-alive tasks
//! └── transport.rs  # Transport trait implementation
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

pub mod config;
mod tasks;
mod transport;
mod types;

pub use config::{DEFAULT_PING_INTERVAL, WebSocketConfig};
pub use types::WebSocketTransport;
