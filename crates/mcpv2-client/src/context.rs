//! Session context management.
//!
//! A [`ContextManager`] owns the conversational state of one client: the
//! session id, a bounded log of successful turns, and free-form extensions.
//! Outgoing requests never see the live state; they carry an immutable
//! [`Context`] snapshot.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use mcpv2_types::{Context, Payload, Request, Response, Turn};
use parking_lot::Mutex;
use serde_json::{Map, Value};

/// Default number of turns kept per session
pub const DEFAULT_MAX_TURNS: usize = 50;

/// Owner of one session's context.
///
/// All mutation goes through an internal lock, so a manager can be shared
/// between concurrent calls. Snapshots are cached until the next mutation.
#[derive(Debug)]
pub struct ContextManager {
    session_id: String,
    max_turns: usize,
    state: Mutex<ContextState>,
}

#[derive(Debug, Default)]
struct ContextState {
    turns: VecDeque<Turn>,
    extensions: Map<String, Value>,
    snapshot: Option<Arc<Context>>,
}

impl ContextManager {
    /// Create an empty context for `session_id`, keeping at most `max_turns` turns.
    pub fn new(session_id: impl Into<String>, max_turns: usize) -> Self {
        Self {
            session_id: session_id.into(),
            max_turns,
            state: Mutex::new(ContextState {
                turns: VecDeque::with_capacity(max_turns.min(1024)),
                ..ContextState::default()
            }),
        }
    }

    /// Create an empty context with a fresh random session id.
    pub fn with_random_session(max_turns: usize) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), max_turns)
    }

    /// Stable id of the session
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Maximum number of turns kept
    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Number of turns currently held
    pub fn len(&self) -> usize {
        self.state.lock().turns.len()
    }

    /// Whether no turns are held
    pub fn is_empty(&self) -> bool {
        self.state.lock().turns.is_empty()
    }

    /// Immutable view of the current state.
    ///
    /// Repeated calls without an intervening mutation return the same `Arc`.
    pub fn snapshot(&self) -> Arc<Context> {
        let mut state = self.state.lock();
        if let Some(snapshot) = &state.snapshot {
            return Arc::clone(snapshot);
        }
        let snapshot = Arc::new(Context {
            session_id: self.session_id.clone(),
            turns: state.turns.iter().cloned().collect(),
            extensions: state.extensions.clone(),
        });
        state.snapshot = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Record the exchange as a turn.
    ///
    /// Only successful responses are recorded; returns whether a turn was
    /// added. When the log is full the oldest turn is evicted.
    pub fn record(&self, request: &Request, response: &Response) -> bool {
        let Payload::Result(result) = &response.payload else {
            return false;
        };
        let turn = Turn {
            request_id: request.id().clone(),
            method: request.method().to_string(),
            params: request.params().clone(),
            result: result.clone(),
            recorded_at: Utc::now(),
        };

        let mut state = self.state.lock();
        state.turns.push_back(turn);
        while state.turns.len() > self.max_turns {
            state.turns.pop_front();
        }
        state.snapshot = None;
        true
    }

    /// Drop every turn and extension. The session id is kept.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.turns.clear();
        state.extensions.clear();
        state.snapshot = None;
    }

    /// An independent copy sharing this session's id and current state.
    pub fn fork(&self) -> Self {
        let state = self.state.lock();
        Self {
            session_id: self.session_id.clone(),
            max_turns: self.max_turns,
            state: Mutex::new(ContextState {
                turns: state.turns.clone(),
                extensions: state.extensions.clone(),
                snapshot: state.snapshot.clone(),
            }),
        }
    }

    /// Value of one extension
    pub fn extension(&self, key: &str) -> Option<Value> {
        self.state.lock().extensions.get(key).cloned()
    }

    /// Set one extension, returning the previous value
    pub fn set_extension(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        let mut state = self.state.lock();
        state.snapshot = None;
        state.extensions.insert(key.into(), value)
    }

    /// Remove one extension, returning its value
    pub fn remove_extension(&self, key: &str) -> Option<Value> {
        let mut state = self.state.lock();
        let removed = state.extensions.remove(key);
        if removed.is_some() {
            state.snapshot = None;
        }
        removed
    }
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::with_random_session(DEFAULT_MAX_TURNS)
    }
}
