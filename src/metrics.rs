//! Gateway-wide counters.
//!
//! Counters are lock-free atomics; the activity timestamp and the response
//! time average share a small mutex.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

/// Process-wide metrics for the proxy engine.
#[derive(Debug)]
pub struct GatewayMetrics {
    /// Sessions successfully established since start
    total_connections: AtomicU64,
    /// Frames forwarded in either direction
    total_messages: AtomicU64,
    /// Parse, synthesis and socket errors
    total_errors: AtomicU64,
    /// Connections removed by the liveness sweeper
    evicted_connections: AtomicU64,
    timing: Mutex<Timing>,
    start_time: Instant,
}

#[derive(Debug, Default)]
struct Timing {
    last_activity: Option<Instant>,
    average_response_time: Option<Duration>,
}

/// Point-in-time view of the metrics, as reported by the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_connections: u64,
    pub active_connections: usize,
    pub total_messages: u64,
    pub total_errors: u64,
    pub evicted_connections: u64,
    pub average_response_time_ms: u64,
    pub seconds_since_last_activity: Option<u64>,
    pub uptime_seconds: u64,
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            total_messages: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            evicted_connections: AtomicU64::new(0),
            timing: Mutex::new(Timing::default()),
            start_time: Instant::now(),
        }
    }

    pub fn record_connection(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub fn record_message(&self) {
        self.total_messages.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub fn record_error(&self) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evicted_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold one turn's response latency into the running average.
    pub fn record_response_time(&self, elapsed: Duration) {
        let mut timing = self.timing.lock();
        timing.average_response_time = Some(match timing.average_response_time {
            Some(avg) => (avg + elapsed) / 2,
            None => elapsed,
        });
    }

    fn touch(&self) {
        self.timing.lock().last_activity = Some(Instant::now());
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Snapshot the counters. `active_connections` comes from the registry.
    pub fn snapshot(&self, active_connections: usize) -> MetricsSnapshot {
        let timing = self.timing.lock();
        MetricsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections,
            total_messages: self.total_messages.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            evicted_connections: self.evicted_connections.load(Ordering::Relaxed),
            average_response_time_ms: timing
                .average_response_time
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
            seconds_since_last_activity: timing.last_activity.map(|t| t.elapsed().as_secs()),
            uptime_seconds: self.uptime().as_secs(),
        }
    }
}
