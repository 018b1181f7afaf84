//! Caller-driven retry helper.
//!
//! The client never retries on its own. Callers that want to retry a call
//! wrap it in [`retry`], which re-runs the operation while the error is
//! [retryable](mcpv2_types::McpError::is_retryable) and the policy allows
//! another attempt.
//!
//! ```rust,no_run
//! # use mcpv2_client::{Client, InvokeOptions, RetryPolicy, retry};
//! # use serde_json::json;
//! # async fn example(client: Client) -> mcpv2_types::McpResult<()> {
//! let response = retry(&RetryPolicy::default(), || {
//!     client.invoke("echo", json!({"text": "hi"}), InvokeOptions::default())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use mcpv2_types::McpResult;
use tracing::debug;

/// Delay schedule between attempts
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Fixed interval between retries
    Fixed {
        /// Time between attempts
        interval: Duration,
        /// Maximum number of retries (None for unlimited)
        max_attempts: Option<u32>,
    },
    /// Exponential backoff with ±25% jitter
    Exponential {
        /// Delay before the first retry
        base: Duration,
        /// Upper bound on any single delay
        max_delay: Duration,
        /// Maximum number of retries (None for unlimited)
        max_attempts: Option<u32>,
    },
    /// Never retry
    Never,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            max_attempts: Some(3),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based), or `None` once the
    /// policy is exhausted.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::Fixed {
                interval,
                max_attempts,
            } => {
                if max_attempts.is_some_and(|max| attempt >= max) {
                    return None;
                }
                Some(*interval)
            }
            Self::Exponential {
                base,
                max_delay,
                max_attempts,
            } => {
                if max_attempts.is_some_and(|max| attempt >= max) {
                    return None;
                }
                let base_ms = base.as_millis() as u64;
                let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
                let capped = base_ms
                    .saturating_mul(factor)
                    .min(max_delay.as_millis() as u64);

                let jitter_range = capped / 4;
                let jitter = if jitter_range > 0 {
                    fastrand::u64(0..jitter_range * 2)
                } else {
                    0
                };
                Some(Duration::from_millis(
                    capped.saturating_sub(jitter_range).saturating_add(jitter),
                ))
            }
            Self::Never => None,
        }
    }
}

/// Run `operation`, retrying retryable failures according to `policy`.
///
/// The last error is returned once the policy is exhausted. Non-retryable
/// errors are returned immediately.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> McpResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = McpResult<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => match policy.delay(attempt) {
                Some(delay) => {
                    debug!(attempt, ?delay, kind = %err.kind, "retrying after failure");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => return Err(err),
            },
            Err(err) => return Err(err),
        }
    }
}
