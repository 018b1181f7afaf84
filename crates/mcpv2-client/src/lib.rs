//! # MCP v2 Client
//!
//! Transport-agnostic client for MCP v2 orchestrators. One [`Client`] talks
//! to one endpoint over HTTP JSON-RPC, WebSocket or gRPC and keeps a bounded
//! session context that travels with each request.
//!
//! ## Features
//!
//! - **One API, three transports**: pick the transport in [`ClientOptions`];
//!   the calling code does not change
//! - **Session context**: successful calls are recorded as turns and the
//!   latest turns are attached to the next request
//! - **Streaming**: [`Client::stream`] yields partial results in order; cancel
//!   or drop the stream to stop the server
//! - **Events**: subscribe to [`ClientEvent`]s for connection, request and
//!   context changes
//! - **Metrics**: per-method latency and outcomes through a [`MetricsSink`],
//!   in memory ([`Metrics`]) or via the `metrics` facade ([`MetricsFacade`])
//! - **File config**: load [`ClientOptions`] from TOML, YAML or JSON with
//!   environment overrides
//!
//! ## Architecture
//!
//! ```text
//! Application
//!        ↓
//! Client (this crate): lifecycle, deadlines, context, events, metrics
//!        ↓
//! Transport trait (mcpv2-transport-traits)
//!        ↓
//! mcpv2-http | mcpv2-websocket | mcpv2-grpc
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use mcpv2_client::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> McpResult<()> {
//!     let client = ClientBuilder::websocket("ws://localhost:9000/mcp")
//!         .with_max_context_turns(10)
//!         .connect()
//!         .await?;
//!
//!     let plan = client
//!         .invoke("plan", json!({"goal": "summarize"}), InvokeOptions::default())
//!         .await?;
//!     println!("plan: {:?} via {:?}", plan.result(), plan.metadata.transport);
//!
//!     let mut tokens = client
//!         .stream("generate", json!({"prompt": "hello"}), InvokeOptions::default())
//!         .await?;
//!     while let Some(item) = tokens.next().await {
//!         println!("{:?}", item?.result());
//!     }
//!
//!     client.disconnect().await
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `http` (default): HTTP JSON-RPC transport
//! - `websocket` (default): WebSocket transport with streaming
//! - `grpc` (default): gRPC transport with streaming

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod client;
pub mod config;
pub mod context;
pub mod events;
pub mod factory;
pub mod observability;
pub mod prelude;
pub mod retry;

pub use client::{Client, ClientBuilder, ClientState, ClientStats, InvokeOptions, ResponseStream};
pub use config::{ClientConfig, ClientOptions, ConfigError};
pub use context::ContextManager;
pub use events::{ClientEvent, EventBus};
pub use factory::{create_client, create_transport};
pub use observability::{
    Logger, MethodMetrics, Metrics, MetricsFacade, MetricsSink, MetricsSnapshot, Outcome,
    TracingLogger,
};
pub use retry::{RetryPolicy, retry};

/// Crate version, sent as `metadata.client_version`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
