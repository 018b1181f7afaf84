//! Session context carried with outgoing requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::RequestId;

/// An immutable view of a session's conversational state.
///
/// Instances are produced by the client's context manager and attached to
/// requests as snapshots; nothing mutates a `Context` once it has been handed out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Stable identifier for the logical session
    pub session_id: String,
    /// Prior exchanges, oldest first
    #[serde(default)]
    pub turns: Vec<Turn>,
    /// Free-form carryover state (streaming cursors and the like)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

impl Context {
    /// An empty context for `session_id`
    pub fn empty(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            turns: Vec::new(),
            extensions: Map::new(),
        }
    }

    /// Number of recorded turns
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turns are recorded
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The most recent turn
    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

/// One recorded request/response exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Id of the request that produced this turn
    pub request_id: RequestId,
    /// Method invoked
    pub method: String,
    /// Parameters sent
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Result received
    pub result: Value,
    /// When the turn was recorded
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_wire_shape() {
        let mut ctx = Context::empty("s-1");
        ctx.turns.push(Turn {
            request_id: "r-1".into(),
            method: "echo".into(),
            params: json!({"text": "hi"}).as_object().cloned().unwrap(),
            result: json!({"text": "hi"}),
            recorded_at: Utc::now(),
        });

        let value = serde_json::to_value(&ctx).unwrap();
        assert_eq!(value["session_id"], "s-1");
        assert_eq!(value["turns"][0]["request_id"], "r-1");
        assert!(value.get("extensions").is_none());

        let back: Context = serde_json::from_value(value).unwrap();
        assert_eq!(back, ctx);
        assert_eq!(back.last_turn().unwrap().method, "echo");
    }
}
