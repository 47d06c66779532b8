//! Metrics collection for work item processing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::parallel::work::FailureKind;

/// Counters describing processed work items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessMetrics {
    /// Items that reached an outcome.
    pub items_processed: u64,

    /// Items that produced a result.
    pub successes: u64,

    /// Items that failed for any reason.
    pub failures: u64,

    /// Failures caused by the per-item timeout.
    pub timeouts: u64,

    /// Failures caused by cancellation.
    pub cancelled: u64,

    /// Sum of item latencies.
    #[serde(with = "crate::util::duration_ms")]
    pub total_latency: Duration,

    /// Mean item latency.
    #[serde(with = "crate::util::duration_ms")]
    pub avg_latency: Duration,

    /// Smallest item latency.
    #[serde(with = "crate::util::duration_ms")]
    pub min_latency: Duration,

    /// Largest item latency.
    #[serde(with = "crate::util::duration_ms")]
    pub max_latency: Duration,
}

impl Default for ProcessMetrics {
    fn default() -> Self {
        Self {
            items_processed: 0,
            successes: 0,
            failures: 0,
            timeouts: 0,
            cancelled: 0,
            total_latency: Duration::ZERO,
            avg_latency: Duration::ZERO,
            min_latency: Duration::ZERO,
            max_latency: Duration::ZERO,
        }
    }
}

impl ProcessMetrics {
    /// Add another snapshot into this one.
    pub fn merge(&mut self, other: &ProcessMetrics) {
        if other.items_processed == 0 {
            return;
        }
        self.min_latency = if self.items_processed == 0 {
            other.min_latency
        } else {
            self.min_latency.min(other.min_latency)
        };
        self.max_latency = self.max_latency.max(other.max_latency);
        self.items_processed += other.items_processed;
        self.successes += other.successes;
        self.failures += other.failures;
        self.timeouts += other.timeouts;
        self.cancelled += other.cancelled;
        self.total_latency += other.total_latency;
        self.avg_latency = self.total_latency / self.items_processed.min(u32::MAX as u64) as u32;
    }
}

/// Lock-free collector for [`ProcessMetrics`].
#[derive(Debug)]
pub struct ProcessMetricsCollector {
    items_processed: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    cancelled: AtomicU64,
    total_latency_nanos: AtomicU64,
    max_latency_nanos: AtomicU64,
    min_latency_nanos: AtomicU64,
    start_time: Instant,
}

impl ProcessMetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            items_processed: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            total_latency_nanos: AtomicU64::new(0),
            max_latency_nanos: AtomicU64::new(0),
            min_latency_nanos: AtomicU64::new(u64::MAX),
            start_time: Instant::now(),
        }
    }

    /// Record one success.
    pub fn record_success(&self, latency: Duration) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency);
    }

    /// Record one failure of `kind`.
    pub fn record_failure(&self, kind: FailureKind, latency: Duration) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        match kind {
            FailureKind::Timeout => {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
            }
            FailureKind::Cancelled => {
                self.cancelled.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
        self.record_latency(latency);
    }

    fn record_latency(&self, latency: Duration) {
        self.items_processed.fetch_add(1, Ordering::Relaxed);

        let nanos = latency.as_nanos().min(u64::MAX as u128) as u64;
        self.total_latency_nanos.fetch_add(nanos, Ordering::Relaxed);

        // Update max latency
        loop {
            let current_max = self.max_latency_nanos.load(Ordering::Relaxed);
            if nanos <= current_max {
                break;
            }
            if self
                .max_latency_nanos
                .compare_exchange_weak(current_max, nanos, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }

        // Update min latency
        loop {
            let current_min = self.min_latency_nanos.load(Ordering::Relaxed);
            if nanos >= current_min {
                break;
            }
            if self
                .min_latency_nanos
                .compare_exchange_weak(current_min, nanos, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }
    }

    /// Fold a finished run's snapshot into this collector.
    pub fn absorb(&self, run: &ProcessMetrics) {
        if run.items_processed == 0 {
            return;
        }
        self.items_processed
            .fetch_add(run.items_processed, Ordering::Relaxed);
        self.successes.fetch_add(run.successes, Ordering::Relaxed);
        self.failures.fetch_add(run.failures, Ordering::Relaxed);
        self.timeouts.fetch_add(run.timeouts, Ordering::Relaxed);
        self.cancelled.fetch_add(run.cancelled, Ordering::Relaxed);
        self.total_latency_nanos
            .fetch_add(run.total_latency.as_nanos() as u64, Ordering::Relaxed);
        self.max_latency_nanos
            .fetch_max(run.max_latency.as_nanos() as u64, Ordering::Relaxed);
        self.min_latency_nanos
            .fetch_min(run.min_latency.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Get the current metrics snapshot.
    pub fn snapshot(&self) -> ProcessMetrics {
        let items_processed = self.items_processed.load(Ordering::Relaxed);
        let total_nanos = self.total_latency_nanos.load(Ordering::Relaxed);

        let avg_nanos = if items_processed > 0 {
            total_nanos / items_processed
        } else {
            0
        };

        let min_nanos = self.min_latency_nanos.load(Ordering::Relaxed);
        let min_latency = if min_nanos == u64::MAX {
            Duration::ZERO
        } else {
            Duration::from_nanos(min_nanos)
        };

        ProcessMetrics {
            items_processed,
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            total_latency: Duration::from_nanos(total_nanos),
            avg_latency: Duration::from_nanos(avg_nanos),
            min_latency,
            max_latency: Duration::from_nanos(self.max_latency_nanos.load(Ordering::Relaxed)),
        }
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        self.items_processed.store(0, Ordering::Relaxed);
        self.successes.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.timeouts.store(0, Ordering::Relaxed);
        self.cancelled.store(0, Ordering::Relaxed);
        self.total_latency_nanos.store(0, Ordering::Relaxed);
        self.max_latency_nanos.store(0, Ordering::Relaxed);
        self.min_latency_nanos.store(u64::MAX, Ordering::Relaxed);
    }

    /// Get the uptime of this collector.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for ProcessMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_snapshot() {
        let collector = ProcessMetricsCollector::new();
        collector.record_success(Duration::from_millis(10));
        collector.record_success(Duration::from_millis(30));
        collector.record_failure(FailureKind::Timeout, Duration::from_millis(50));

        let metrics = collector.snapshot();
        assert_eq!(metrics.items_processed, 3);
        assert_eq!(metrics.successes, 2);
        assert_eq!(metrics.failures, 1);
        assert_eq!(metrics.timeouts, 1);
        assert_eq!(metrics.min_latency, Duration::from_millis(10));
        assert_eq!(metrics.max_latency, Duration::from_millis(50));
        assert_eq!(metrics.avg_latency, Duration::from_millis(30));
    }

    #[test]
    fn test_empty_snapshot_and_reset() {
        let collector = ProcessMetricsCollector::new();
        assert_eq!(collector.snapshot(), ProcessMetrics::default());

        collector.record_success(Duration::from_millis(1));
        collector.reset();
        assert_eq!(collector.snapshot().items_processed, 0);
    }

    #[test]
    fn test_absorb_and_merge() {
        let run = ProcessMetricsCollector::new();
        run.record_success(Duration::from_millis(4));
        run.record_failure(FailureKind::Cancelled, Duration::from_millis(2));
        let snapshot = run.snapshot();

        let cumulative = ProcessMetricsCollector::new();
        cumulative.absorb(&snapshot);
        cumulative.absorb(&snapshot);
        let total = cumulative.snapshot();
        assert_eq!(total.items_processed, 4);
        assert_eq!(total.cancelled, 2);
        assert_eq!(total.min_latency, Duration::from_millis(2));

        let mut merged = ProcessMetrics::default();
        merged.merge(&snapshot);
        merged.merge(&snapshot);
        assert_eq!(merged, total);
    }
}
