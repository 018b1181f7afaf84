//! Prelude module for convenient imports
//!
//! ```rust,no_run
//! use mcpv2_client::prelude::*;
//!
//! # async fn example() -> McpResult<()> {
//! let client = ClientBuilder::http("http://localhost:8080/rpc").connect().await?;
//! let response = client
//!     .invoke("ping", serde_json::json!({}), InvokeOptions::default())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub use crate::VERSION;

pub use crate::{
    // Core client types
    Client,
    ClientBuilder,
    ClientConfig,
    // Events and observability
    ClientEvent,
    ClientOptions,
    ClientState,
    ClientStats,
    ContextManager,
    InvokeOptions,
    Metrics,
    MetricsFacade,
    MetricsSink,
    ResponseStream,
    RetryPolicy,
    create_client,
};

pub use mcpv2_transport_traits::{CredentialProvider, StaticCredentials, Transport, TransportKind};
pub use mcpv2_types::{Context, ErrorKind, McpError, McpResult, Request, RequestId, Response, Turn};
