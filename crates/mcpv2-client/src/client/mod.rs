//! Client façade.
//!
//! - `core`: [`Client`] and its shared state, lifecycle and call paths
//! - `builder`: [`ClientBuilder`] for fluent construction
//! - `options`: per-call options, lifecycle state and statistics
//! - `stream`: [`ResponseStream`] with cancel-on-drop
//!
//! `Client` is cloneable via `Arc<ClientInner>`; clones share one connection.

mod builder;
mod core;
mod options;
mod stream;

pub use builder::ClientBuilder;
pub use self::core::Client;
pub use options::{ClientState, ClientStats, InvokeOptions};
pub use stream::ResponseStream;
