//! Request identifiers.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{McpError, McpResult};

/// Client-generated correlation token for one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random identifier
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Monotonic id source scoped to one client.
///
/// Ids look like `3f2a9c1e-17`: a random prefix chosen at construction followed
/// by a counter, so two generators in one process never collide.
#[derive(Debug)]
pub struct RequestIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl RequestIdGenerator {
    /// Create a generator with a random prefix
    pub fn new() -> Self {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        Self::with_prefix(&uuid[..8])
    }

    /// Create a generator with a fixed prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }

    /// Produce the next id
    pub fn next_id(&self) -> RequestId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        RequestId(format!("{}-{}", self.prefix, n))
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded record of recently issued ids used to reject duplicates.
///
/// Holds at most `capacity` ids; the oldest id leaves the window first.
#[derive(Debug)]
pub struct IdWindow {
    capacity: usize,
    seen: HashSet<RequestId>,
    order: VecDeque<RequestId>,
}

impl IdWindow {
    /// Default number of ids remembered
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Create a window remembering up to `capacity` ids
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            seen: HashSet::with_capacity(capacity.min(4096)),
            order: VecDeque::with_capacity(capacity.min(4096)),
        }
    }

    /// Admit `id`, failing with a validation error if it is already in the window
    pub fn admit(&mut self, id: &RequestId) -> McpResult<()> {
        if self.seen.contains(id) {
            return Err(McpError::validation(format!(
                "duplicate request id '{id}' within the session window"
            ))
            .with_request_id(id.as_str()));
        }
        if self.order.len() == self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.seen.remove(&oldest);
        }
        self.seen.insert(id.clone());
        self.order.push_back(id.clone());
        Ok(())
    }

    /// Whether `id` is currently in the window
    pub fn contains(&self, id: &RequestId) -> bool {
        self.seen.contains(id)
    }

    /// Number of ids remembered
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the window is empty
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Forget every id
    pub fn clear(&mut self) {
        self.seen.clear();
        self.order.clear();
    }
}

impl Default for IdWindow {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_generator_is_monotonic() {
        let ids = RequestIdGenerator::with_prefix("c");
        assert_eq!(ids.next_id().as_str(), "c-1");
        assert_eq!(ids.next_id().as_str(), "c-2");
        assert_eq!(ids.next_id().as_str(), "c-3");
    }

    #[test]
    fn test_generators_do_not_collide() {
        let a = RequestIdGenerator::new();
        let b = RequestIdGenerator::new();
        assert_ne!(a.next_id(), b.next_id());
    }

    #[test]
    fn test_window_rejects_duplicates() {
        let mut window = IdWindow::new(8);
        let id = RequestId::new("req-1");
        window.admit(&id).unwrap();
        let err = window.admit(&id).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("req-1"));
    }

    #[test]
    fn test_window_forgets_oldest() {
        let mut window = IdWindow::new(2);
        window.admit(&"a".into()).unwrap();
        window.admit(&"b".into()).unwrap();
        window.admit(&"c".into()).unwrap();

        assert_eq!(window.len(), 2);
        assert!(!window.contains(&"a".into()));
        // "a" fell out of the window and is accepted again
        window.admit(&"a".into()).unwrap();
        assert!(window.admit(&"c".into()).is_err());
    }
}
