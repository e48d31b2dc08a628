//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics so passes never contend with the reporter or the
//! `/metrics` endpoint. Reporting is the only operation that resets
//! anything (via atomic swap).
//!
//! NOTE: All atomics use Relaxed ordering; these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use crate::domain::types::PassSummary;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Exponential bucket boundaries for pass duration (milliseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
const NUM_BUCKETS: usize = 11;

/// Compute bucket index for a duration using binary search
#[inline]
fn bucket_index(duration_ms: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < duration_ms)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Passes that ran to completion or were cancelled (monotonic)
    passes_total: AtomicU64,
    /// Passes aborted by a snapshot load failure (monotonic)
    passes_failed: AtomicU64,
    /// Triggers refused because a pass was running (monotonic)
    passes_rejected: AtomicU64,
    /// Passes stopped early by shutdown (monotonic)
    passes_cancelled: AtomicU64,
    /// Passes since last report (reset on report)
    passes_since_report: AtomicU64,
    /// Vehicles evaluated across all passes (monotonic)
    vehicles_processed: AtomicU64,
    /// Vehicles matched to a region (monotonic)
    vehicles_matched: AtomicU64,
    /// Vehicles found in no region (monotonic)
    vehicles_unmatched: AtomicU64,
    /// Region evaluations skipped for a malformed boundary (monotonic)
    boundary_errors: AtomicU64,
    /// Occupancy writes that failed (monotonic)
    write_failures: AtomicU64,
    /// Pass duration histogram buckets in ms (reset on report)
    pass_duration_buckets: [AtomicU64; NUM_BUCKETS],
    /// Sum of pass durations in ms (reset on report)
    pass_duration_sum_ms: AtomicU64,
    /// Max pass duration in ms (reset on report)
    pass_duration_max_ms: AtomicU64,
    /// Vehicles matched in the most recent pass
    last_pass_matched: AtomicU64,
    /// Epoch ms at which the most recent pass started
    last_pass_at_ms: AtomicU64,
    /// Last report time (only accessed from reporter, not atomic)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            passes_total: AtomicU64::new(0),
            passes_failed: AtomicU64::new(0),
            passes_rejected: AtomicU64::new(0),
            passes_cancelled: AtomicU64::new(0),
            passes_since_report: AtomicU64::new(0),
            vehicles_processed: AtomicU64::new(0),
            vehicles_matched: AtomicU64::new(0),
            vehicles_unmatched: AtomicU64::new(0),
            boundary_errors: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            pass_duration_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            pass_duration_sum_ms: AtomicU64::new(0),
            pass_duration_max_ms: AtomicU64::new(0),
            last_pass_matched: AtomicU64::new(0),
            last_pass_at_ms: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record a pass that produced a summary (lock-free)
    pub fn record_pass(&self, summary: &PassSummary) {
        self.passes_total.fetch_add(1, Ordering::Relaxed);
        self.passes_since_report.fetch_add(1, Ordering::Relaxed);
        if summary.cancelled {
            self.passes_cancelled.fetch_add(1, Ordering::Relaxed);
        }

        self.vehicles_processed.fetch_add(summary.vehicles_processed, Ordering::Relaxed);
        self.vehicles_matched.fetch_add(summary.matched, Ordering::Relaxed);
        self.vehicles_unmatched.fetch_add(summary.unmatched, Ordering::Relaxed);
        self.boundary_errors.fetch_add(summary.boundary_errors, Ordering::Relaxed);
        self.write_failures.fetch_add(summary.write_failures, Ordering::Relaxed);

        let bucket = bucket_index(summary.duration_ms);
        self.pass_duration_buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.pass_duration_sum_ms.fetch_add(summary.duration_ms, Ordering::Relaxed);
        update_atomic_max(&self.pass_duration_max_ms, summary.duration_ms);

        self.last_pass_matched.store(summary.matched, Ordering::Relaxed);
        self.last_pass_at_ms.store(summary.started_at_ms, Ordering::Relaxed);
    }

    /// Record a pass aborted before any writes
    #[inline]
    pub fn record_pass_failed(&self) {
        self.passes_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a trigger refused under the reject policy
    #[inline]
    pub fn record_pass_rejected(&self) {
        self.passes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn passes_total(&self) -> u64 {
        self.passes_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn passes_failed(&self) -> u64 {
        self.passes_failed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn passes_rejected(&self) -> u64 {
        self.passes_rejected.load(Ordering::Relaxed)
    }

    /// Calculate and return metrics summary, then reset periodic counters
    pub fn report(&self) -> MetricsSummary {
        let passes_count = self.passes_since_report.swap(0, Ordering::Relaxed);
        let duration_sum = self.pass_duration_sum_ms.swap(0, Ordering::Relaxed);
        let duration_max = self.pass_duration_max_ms.swap(0, Ordering::Relaxed);
        let pass_duration_buckets = swap_buckets(&self.pass_duration_buckets);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let passes_per_min = if elapsed.as_secs_f64() > 0.0 {
            passes_count as f64 * 60.0 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        let avg_duration = if passes_count > 0 { duration_sum / passes_count } else { 0 };

        MetricsSummary {
            passes_total: self.passes_total.load(Ordering::Relaxed),
            passes_failed: self.passes_failed.load(Ordering::Relaxed),
            passes_rejected: self.passes_rejected.load(Ordering::Relaxed),
            passes_cancelled: self.passes_cancelled.load(Ordering::Relaxed),
            passes_per_min,
            vehicles_processed: self.vehicles_processed.load(Ordering::Relaxed),
            vehicles_matched: self.vehicles_matched.load(Ordering::Relaxed),
            vehicles_unmatched: self.vehicles_unmatched.load(Ordering::Relaxed),
            boundary_errors: self.boundary_errors.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            pass_duration_buckets,
            pass_duration_avg_ms: avg_duration,
            pass_duration_max_ms: duration_max,
            pass_duration_p50_ms: percentile_from_buckets(&pass_duration_buckets, 0.50),
            pass_duration_p99_ms: percentile_from_buckets(&pass_duration_buckets, 0.99),
            last_pass_matched: self.last_pass_matched.load(Ordering::Relaxed),
            last_pass_at_ms: self.last_pass_at_ms.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of histogram buckets (exported for Prometheus formatting)
pub const METRICS_NUM_BUCKETS: usize = NUM_BUCKETS;

/// Exported bucket bounds for Prometheus formatting
pub const METRICS_BUCKET_BOUNDS: [u64; 10] = BUCKET_BOUNDS;

#[derive(Debug)]
pub struct MetricsSummary {
    pub passes_total: u64,
    pub passes_failed: u64,
    pub passes_rejected: u64,
    pub passes_cancelled: u64,
    pub passes_per_min: f64,
    pub vehicles_processed: u64,
    pub vehicles_matched: u64,
    pub vehicles_unmatched: u64,
    pub boundary_errors: u64,
    pub write_failures: u64,
    /// Pass duration histogram buckets
    /// Bounds: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200 ms
    pub pass_duration_buckets: [u64; NUM_BUCKETS],
    pub pass_duration_avg_ms: u64,
    pub pass_duration_max_ms: u64,
    pub pass_duration_p50_ms: u64,
    pub pass_duration_p99_ms: u64,
    pub last_pass_matched: u64,
    pub last_pass_at_ms: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            passes_total = %self.passes_total,
            passes_failed = %self.passes_failed,
            passes_rejected = %self.passes_rejected,
            passes_per_min = format!("{:.2}", self.passes_per_min),
            vehicles_processed = %self.vehicles_processed,
            last_pass_matched = %self.last_pass_matched,
            boundary_errors = %self.boundary_errors,
            write_failures = %self.write_failures,
            avg_pass_ms = %self.pass_duration_avg_ms,
            max_pass_ms = %self.pass_duration_max_ms,
            "metrics_summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(matched: u64, unmatched: u64, duration_ms: u64) -> PassSummary {
        PassSummary {
            pass_id: "test".to_string(),
            vehicles_processed: matched + unmatched,
            matched,
            unmatched,
            duration_ms,
            started_at_ms: 1_700_000_000_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.passes_total(), 0);
        assert_eq!(metrics.passes_failed(), 0);
    }

    #[test]
    fn test_record_pass() {
        let metrics = Metrics::new();

        metrics.record_pass(&summary(3, 2, 10));
        metrics.record_pass(&summary(1, 4, 30));

        let report = metrics.report();
        assert_eq!(report.passes_total, 2);
        assert_eq!(report.vehicles_processed, 10);
        assert_eq!(report.vehicles_matched, 4);
        assert_eq!(report.vehicles_unmatched, 6);
        assert_eq!(report.last_pass_matched, 1);
        assert_eq!(report.pass_duration_avg_ms, 20);
        assert_eq!(report.pass_duration_max_ms, 30);
    }

    #[test]
    fn test_report_resets_periodic_only() {
        let metrics = Metrics::new();
        metrics.record_pass(&summary(1, 0, 50));

        let _ = metrics.report();
        let second = metrics.report();

        assert_eq!(second.passes_total, 1);
        assert_eq!(second.pass_duration_max_ms, 0);
        assert_eq!(second.pass_duration_buckets.iter().sum::<u64>(), 0);
    }

    #[test]
    fn test_failed_and_rejected_counters() {
        let metrics = Metrics::new();
        metrics.record_pass_failed();
        metrics.record_pass_rejected();
        metrics.record_pass_rejected();

        assert_eq!(metrics.passes_failed(), 1);
        assert_eq!(metrics.passes_rejected(), 2);
        assert_eq!(metrics.passes_total(), 0);
    }

    #[test]
    fn test_cancelled_pass_counted() {
        let metrics = Metrics::new();
        let mut cancelled = summary(0, 0, 1);
        cancelled.cancelled = true;

        metrics.record_pass(&cancelled);

        assert_eq!(metrics.report().passes_cancelled, 1);
    }

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(100), 0);
        assert_eq!(bucket_index(101), 1);
        assert_eq!(bucket_index(51200), 9);
        assert_eq!(bucket_index(51201), 10); // overflow
    }

    #[test]
    fn test_percentile_computation() {
        let metrics = Metrics::new();
        for _ in 0..100 {
            metrics.record_pass(&summary(1, 0, 150));
        }

        let report = metrics.report();
        assert_eq!(report.pass_duration_p50_ms, 200);
        assert_eq!(report.pass_duration_p99_ms, 200);
    }

    #[test]
    fn test_concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(Metrics::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let m = metrics.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..500 {
                    m.record_pass(&summary(1, 1, 5));
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(metrics.passes_total(), 4000);
        assert_eq!(metrics.report().vehicles_processed, 8000);
    }
}
