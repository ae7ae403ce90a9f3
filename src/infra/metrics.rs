//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//! Reporting swaps the per-interval counters and keeps the totals.
//!
//! NOTE: All atomics use Relaxed ordering: these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Kiosk-wide counters
pub struct Metrics {
    scans_accepted: AtomicU64,
    scans_rejected: AtomicU64,
    scans_ignored: AtomicU64,
    feed_binds: AtomicU64,
    feed_refreshes: AtomicU64,
    capture_errors: AtomicU64,
    enumeration_failures: AtomicU64,
    analytics_dropped: AtomicU64,
    // Interval counters (reset on report)
    interval_scans: AtomicU64,
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            scans_accepted: AtomicU64::new(0),
            scans_rejected: AtomicU64::new(0),
            scans_ignored: AtomicU64::new(0),
            feed_binds: AtomicU64::new(0),
            feed_refreshes: AtomicU64::new(0),
            capture_errors: AtomicU64::new(0),
            enumeration_failures: AtomicU64::new(0),
            analytics_dropped: AtomicU64::new(0),
            interval_scans: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    #[inline]
    pub fn record_scan_accepted(&self) {
        self.scans_accepted.fetch_add(1, Ordering::Relaxed);
        self.interval_scans.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_scan_rejected(&self) {
        self.scans_rejected.fetch_add(1, Ordering::Relaxed);
        self.interval_scans.fetch_add(1, Ordering::Relaxed);
    }

    /// Decodes that arrived while a pass was already displayed
    #[inline]
    pub fn record_scan_ignored(&self) {
        self.scans_ignored.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_feed_bound(&self) {
        self.feed_binds.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_feed_refresh(&self) {
        self.feed_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_capture_error(&self) {
        self.capture_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_enumeration_failure(&self) {
        self.enumeration_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_analytics_dropped(&self) {
        self.analytics_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn scans_accepted(&self) -> u64 {
        self.scans_accepted.load(Ordering::Relaxed)
    }

    pub fn scans_rejected(&self) -> u64 {
        self.scans_rejected.load(Ordering::Relaxed)
    }

    pub fn feed_binds(&self) -> u64 {
        self.feed_binds.load(Ordering::Relaxed)
    }

    pub fn feed_refreshes(&self) -> u64 {
        self.feed_refreshes.load(Ordering::Relaxed)
    }

    pub fn capture_errors(&self) -> u64 {
        self.capture_errors.load(Ordering::Relaxed)
    }

    pub fn enumeration_failures(&self) -> u64 {
        self.enumeration_failures.load(Ordering::Relaxed)
    }

    pub fn analytics_dropped(&self) -> u64 {
        self.analytics_dropped.load(Ordering::Relaxed)
    }

    /// Snapshot totals and reset the interval counters
    pub fn report(&self) -> MetricsSummary {
        let now = Instant::now();
        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = now.duration_since(*last);
            *last = now;
            elapsed
        };
        let interval_scans = self.interval_scans.swap(0, Ordering::Relaxed);
        let elapsed_secs = elapsed.as_secs_f64();
        let scans_per_min =
            if elapsed_secs > 0.0 { interval_scans as f64 * 60.0 / elapsed_secs } else { 0.0 };

        MetricsSummary {
            scans_accepted: self.scans_accepted(),
            scans_rejected: self.scans_rejected(),
            scans_ignored: self.scans_ignored.load(Ordering::Relaxed),
            scans_per_min,
            feed_binds: self.feed_binds(),
            feed_refreshes: self.feed_refreshes(),
            capture_errors: self.capture_errors(),
            enumeration_failures: self.enumeration_failures(),
            analytics_dropped: self.analytics_dropped(),
        }
    }
}

/// Point-in-time metrics snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSummary {
    pub scans_accepted: u64,
    pub scans_rejected: u64,
    pub scans_ignored: u64,
    pub scans_per_min: f64,
    pub feed_binds: u64,
    pub feed_refreshes: u64,
    pub capture_errors: u64,
    pub enumeration_failures: u64,
    pub analytics_dropped: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            scans_accepted = %self.scans_accepted,
            scans_rejected = %self.scans_rejected,
            scans_ignored = %self.scans_ignored,
            scans_per_min = %format!("{:.1}", self.scans_per_min),
            feed_binds = %self.feed_binds,
            feed_refreshes = %self.feed_refreshes,
            capture_errors = %self.capture_errors,
            enumeration_failures = %self.enumeration_failures,
            analytics_dropped = %self.analytics_dropped,
            "metrics"
        );
    }
}
