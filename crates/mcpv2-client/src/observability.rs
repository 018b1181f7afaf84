//! Observability hooks.
//!
//! The client calls two collaborators at fixed points of every call:
//!
//! - a [`MetricsSink`] receives the latency and outcome of each request or
//!   stream item
//! - a [`Logger`] receives every [`ClientEvent`]
//!
//! Sinks are supplied through the client configuration. [`Metrics`] keeps
//! aggregates in memory, [`MetricsFacade`] forwards to the `metrics` crate so
//! any installed recorder (Prometheus, StatsD, ...) sees client traffic, and
//! [`TracingLogger`] writes events through `tracing`.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Once;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use mcpv2_types::ErrorKind;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::events::ClientEvent;

/// How a call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// A result payload arrived
    Success,
    /// The call failed; remote error payloads are [`ErrorKind::Remote`]
    Error(ErrorKind),
}

impl Outcome {
    /// Label used for metric dimensions
    pub const fn label(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error(kind) => kind.as_str(),
        }
    }

    /// Whether the call succeeded
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Receives per-call measurements.
pub trait MetricsSink: Send + Sync + fmt::Debug {
    /// Time from send to response for one request or stream item.
    fn record_latency(&self, method: &str, latency: Duration);

    /// Final classification of one request or stream item.
    fn record_outcome(&self, method: &str, outcome: Outcome);
}

/// Receives every client event.
pub trait Logger: Send + Sync + fmt::Debug {
    /// Handle one event. Must not block.
    fn log(&self, event: &ClientEvent);
}

/// Writes client events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, event: &ClientEvent) {
        match event {
            ClientEvent::ConnectionOpened {
                transport,
                endpoint,
            } => info!(%transport, %endpoint, "connection opened"),
            ClientEvent::ConnectionClosed {
                transport,
                endpoint,
            } => info!(%transport, %endpoint, "connection closed"),
            ClientEvent::ConnectionLost { transport, reason } => {
                warn!(%transport, %reason, "connection lost");
            }
            ClientEvent::RequestSent {
                request_id,
                method,
                with_context,
            } => debug!(%request_id, %method, with_context, "request sent"),
            ClientEvent::ResponseReceived {
                request_id,
                method,
                latency_ms,
                is_error,
            } => debug!(%request_id, %method, latency_ms, is_error, "response received"),
            ClientEvent::ErrorOccurred {
                request_id,
                method,
                kind,
                message,
            } => warn!(
                request_id = request_id.as_ref().map(|id| id.as_str()),
                method = method.as_deref(),
                %kind,
                %message,
                "call failed"
            ),
            ClientEvent::ContextUpdated { session_id, turns } => {
                debug!(%session_id, turns, "context updated");
            }
            ClientEvent::StreamCancelled { request_id } => {
                debug!(%request_id, "stream cancelled");
            }
            ClientEvent::ProtocolViolation { request_id, detail } => {
                warn!(%request_id, %detail, "protocol violation");
            }
        }
    }
}

/// Number of recent latencies kept for percentile estimates
const RECENT_CAPACITY: usize = 1000;

/// In-memory metrics collector.
///
/// Counters are atomics; latency statistics and per-method aggregates sit
/// behind read-write locks.
#[derive(Debug)]
pub struct Metrics {
    total_requests: AtomicU64,
    successful_responses: AtomicU64,
    error_responses: AtomicU64,
    response_times: RwLock<ResponseTimeStats>,
    method_metrics: RwLock<HashMap<String, MethodMetrics>>,
    start_time: RwLock<Instant>,
}

#[derive(Debug, Default)]
struct ResponseTimeStats {
    total_ms: u64,
    count: u64,
    min_ms: Option<u64>,
    max_ms: u64,
    recent: VecDeque<u64>,
}

impl ResponseTimeStats {
    fn percentile(&self, pct: f64) -> Option<u64> {
        if self.recent.is_empty() {
            return None;
        }
        let mut sorted: Vec<u64> = self.recent.iter().copied().collect();
        sorted.sort_unstable();
        let rank = ((pct / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted.get(rank).copied()
    }
}

/// Per-method aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MethodMetrics {
    /// Calls that reached an outcome
    pub count: u64,
    /// Successful calls
    pub success_count: u64,
    /// Failed calls
    pub error_count: u64,
    /// Failed calls by error kind
    pub errors_by_kind: HashMap<String, u64>,
    /// Latency samples recorded
    pub timed_count: u64,
    /// Average latency in milliseconds
    pub avg_duration_ms: f64,
    /// Slowest call in milliseconds
    pub max_duration_ms: u64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Calls that reached an outcome
    pub total_requests: u64,
    /// Successful calls
    pub successful_responses: u64,
    /// Failed calls
    pub error_responses: u64,
    /// Average latency in milliseconds
    pub avg_response_time_ms: f64,
    /// Fastest call in milliseconds
    pub min_response_time_ms: Option<u64>,
    /// Slowest call in milliseconds
    pub max_response_time_ms: u64,
    /// 95th percentile over the most recent calls
    pub p95_response_time_ms: Option<u64>,
    /// Calls per second since start or last reset
    pub requests_per_second: f64,
    /// Per-method aggregates
    pub method_metrics: HashMap<String, MethodMetrics>,
    /// Time since start or last reset
    pub uptime: Duration,
}

impl Metrics {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            successful_responses: AtomicU64::new(0),
            error_responses: AtomicU64::new(0),
            response_times: RwLock::new(ResponseTimeStats::default()),
            method_metrics: RwLock::new(HashMap::new()),
            start_time: RwLock::new(Instant::now()),
        }
    }

    /// Get a snapshot of current metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let uptime = self.start_time.read().elapsed();

        let (avg_ms, min_ms, max_ms, p95) = {
            let stats = self.response_times.read();
            let avg = if stats.count > 0 {
                stats.total_ms as f64 / stats.count as f64
            } else {
                0.0
            };
            (avg, stats.min_ms, stats.max_ms, stats.percentile(95.0))
        };

        MetricsSnapshot {
            total_requests: total,
            successful_responses: self.successful_responses.load(Ordering::Relaxed),
            error_responses: self.error_responses.load(Ordering::Relaxed),
            avg_response_time_ms: avg_ms,
            min_response_time_ms: min_ms,
            max_response_time_ms: max_ms,
            p95_response_time_ms: p95,
            requests_per_second: if uptime.as_secs() > 0 {
                total as f64 / uptime.as_secs_f64()
            } else {
                total as f64
            },
            method_metrics: self.method_metrics.read().clone(),
            uptime,
        }
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.successful_responses.store(0, Ordering::Relaxed);
        self.error_responses.store(0, Ordering::Relaxed);
        *self.response_times.write() = ResponseTimeStats::default();
        self.method_metrics.write().clear();
        *self.start_time.write() = Instant::now();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for Metrics {
    fn record_latency(&self, method: &str, latency: Duration) {
        let ms = latency.as_millis() as u64;
        {
            let mut stats = self.response_times.write();
            stats.total_ms += ms;
            stats.count += 1;
            stats.max_ms = stats.max_ms.max(ms);
            stats.min_ms = Some(stats.min_ms.map_or(ms, |min| min.min(ms)));
            if stats.recent.len() >= RECENT_CAPACITY {
                stats.recent.pop_front();
            }
            stats.recent.push_back(ms);
        }

        let mut methods = self.method_metrics.write();
        let entry = methods.entry(method.to_string()).or_default();
        entry.timed_count += 1;
        entry.max_duration_ms = entry.max_duration_ms.max(ms);
        // Running average
        entry.avg_duration_ms = (entry.avg_duration_ms * (entry.timed_count - 1) as f64
            + ms as f64)
            / entry.timed_count as f64;
    }

    fn record_outcome(&self, method: &str, outcome: Outcome) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if outcome.is_success() {
            self.successful_responses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.error_responses.fetch_add(1, Ordering::Relaxed);
        }

        let mut methods = self.method_metrics.write();
        let entry = methods.entry(method.to_string()).or_default();
        entry.count += 1;
        match outcome {
            Outcome::Success => entry.success_count += 1,
            Outcome::Error(kind) => {
                entry.error_count += 1;
                *entry
                    .errors_by_kind
                    .entry(kind.as_str().to_string())
                    .or_default() += 1;
            }
        }
    }
}

static DESCRIBE: Once = Once::new();

/// Forwards measurements to the global `metrics` recorder.
///
/// Metrics provided:
///
/// - `mcpv2_client_request_duration_seconds`: histogram (labels: method)
/// - `mcpv2_client_requests_total`: counter (labels: method, outcome)
///
/// Without an installed recorder every call is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsFacade;

impl MetricsFacade {
    /// Create the facade, registering metric descriptions once per process.
    pub fn new() -> Self {
        DESCRIBE.call_once(|| {
            metrics::describe_histogram!(
                "mcpv2_client_request_duration_seconds",
                metrics::Unit::Seconds,
                "Time from request send to response arrival"
            );
            metrics::describe_counter!(
                "mcpv2_client_requests_total",
                "Completed client calls by method and outcome"
            );
        });
        Self
    }
}

impl MetricsSink for MetricsFacade {
    fn record_latency(&self, method: &str, latency: Duration) {
        metrics::histogram!(
            "mcpv2_client_request_duration_seconds",
            "method" => method.to_owned()
        )
        .record(latency.as_secs_f64());
    }

    fn record_outcome(&self, method: &str, outcome: Outcome) {
        metrics::counter!(
            "mcpv2_client_requests_total",
            "method" => method.to_owned(),
            "outcome" => outcome.label()
        )
        .increment(1);
    }
}
