//! # MCP v2 Types
//!
//! Value types shared by every layer of the MCP v2 client:
//!
//! - **Requests**: [`Request`], validated on construction
//! - **Responses**: [`Response`], [`Payload`], [`ErrorObject`], [`ResponseMetadata`]
//! - **Context**: [`Context`] snapshots and recorded [`Turn`]s
//! - **Identifiers**: [`RequestId`], [`RequestIdGenerator`], [`IdWindow`]
//! - **Errors**: [`McpError`], [`ErrorKind`], [`McpResult`]
//!
//! ## Quick Start
//!
//! ```rust
//! use mcpv2_types::{Request, Response};
//! use serde_json::json;
//!
//! let request = Request::with_id("r-1", "echo", json!({"text": "hi"})).unwrap();
//! let response: Response =
//!     serde_json::from_value(json!({"id": "r-1", "result": {"text": "hi"}})).unwrap();
//!
//! assert_eq!(&response.id, request.id());
//! assert_eq!(response.result().unwrap()["text"], "hi");
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

pub mod context;
pub mod error;
pub mod id;
pub mod request;
pub mod response;

pub use context::{Context, Turn};
pub use error::{ErrorContext, ErrorKind, McpError, McpResult};
pub use id::{IdWindow, RequestId, RequestIdGenerator};
pub use request::Request;
pub use response::{ErrorObject, Payload, Response, ResponseMetadata};

/// Protocol version spoken by this client
pub const PROTOCOL_VERSION: &str = "2.0";

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
