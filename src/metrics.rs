//! Proxy counters
//!
//! Lightweight atomic counters for the serving path and the control
//! activity. Snapshots feed log lines and tests. There is no scrape
//! endpoint: the proxy forwards every URL path to the upstream, so there is
//! no place to mount one.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the request path and the check-and-collect activity.
#[derive(Debug, Default)]
pub struct ProxyMetrics {
    proxied: AtomicU64,
    shed: AtomicU64,
    upstream_errors: AtomicU64,
    heap_checks: AtomicU64,
    collects: AtomicU64,
}

impl ProxyMetrics {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request forwarded and answered by the upstream.
    pub fn record_proxied(&self) {
        self.proxied.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request shed with `503`.
    pub fn record_shed(&self) {
        self.shed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a proxied request that failed at the upstream.
    pub fn record_upstream_error(&self) {
        self.upstream_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one heap check issued to the control endpoint.
    pub fn record_heap_check(&self) {
        self.heap_checks.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one completed collection cycle.
    pub fn record_collect(&self) {
        self.collects.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counter values.
    #[must_use]
    pub fn snapshot(&self) -> ProxyMetricsSnapshot {
        ProxyMetricsSnapshot {
            proxied: self.proxied.load(Ordering::Relaxed),
            shed: self.shed.load(Ordering::Relaxed),
            upstream_errors: self.upstream_errors.load(Ordering::Relaxed),
            heap_checks: self.heap_checks.load(Ordering::Relaxed),
            collects: self.collects.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`ProxyMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyMetricsSnapshot {
    /// Requests forwarded and answered by the upstream.
    pub proxied: u64,
    /// Requests shed with `503`.
    pub shed: u64,
    /// Proxied requests that failed at the upstream.
    pub upstream_errors: u64,
    /// Heap checks issued to the control endpoint.
    pub heap_checks: u64,
    /// Collection cycles completed.
    pub collects: u64,
}
