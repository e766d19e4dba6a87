//! Pipeline latency metrics: measurement, aggregation, reporting.
//!
//! Three concerns, strictly separated:
//!
//! - **Measurement** — [`LatencyCollector`] records latency samples in a
//!   fixed-capacity rolling window plus monotonic arrival times for rate
//!   computation.
//! - **Aggregation** — [`compute_percentile`] derives P50/P99 (or any
//!   percentile) by sort + linear interpolation, no external libraries.
//! - **Reporting** — [`MetricsReporter`] drives the periodic
//!   `"Latency P50 | P99 | Alerts/min"` log line, decoupling scheduling
//!   from the math.

mod aggregator;

pub use aggregator::MetricsAggregator;

use std::collections::VecDeque;
use std::time::Instant;

use tracing::info;

use crate::config::defaults::{LATENCY_WINDOW_SIZE, RATE_WINDOW_SECONDS};

// ============================================================================
// Percentile computation — pure function, no state
// ============================================================================

/// Percentile (0–100) of a sample set via linear interpolation between the
/// two adjacent sorted positions. Returns 0.0 for an empty set.
pub fn compute_percentile(data: &[f64], percentile: f64) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = data.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    #[allow(clippy::cast_precision_loss)]
    let k = (percentile / 100.0) * (n - 1) as f64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let lo = k.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = k - k.floor();
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

// ============================================================================
// Measurement — LatencyCollector
// ============================================================================

/// Rolling window of latency measurements with percentile and rate accessors.
///
/// Two bounded deques evict oldest entries automatically; reads never
/// mutate.
pub struct LatencyCollector {
    latencies: VecDeque<f64>,
    arrival_times: VecDeque<Instant>,
    capacity: usize,
}

impl Default for LatencyCollector {
    fn default() -> Self {
        Self::new(LATENCY_WINDOW_SIZE)
    }
}

impl LatencyCollector {
    pub fn new(capacity: usize) -> Self {
        Self {
            latencies: VecDeque::with_capacity(capacity),
            arrival_times: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record one latency sample and its monotonic arrival time.
    pub fn record(&mut self, latency_ms: f64) {
        if self.latencies.len() >= self.capacity {
            self.latencies.pop_front();
            self.arrival_times.pop_front();
        }
        self.latencies.push_back(latency_ms);
        self.arrival_times.push_back(Instant::now());
    }

    pub fn p50(&self) -> f64 {
        self.percentile(50.0)
    }

    pub fn p99(&self) -> f64 {
        self.percentile(99.0)
    }

    fn percentile(&self, p: f64) -> f64 {
        let samples: Vec<f64> = self.latencies.iter().copied().collect();
        compute_percentile(&samples, p)
    }

    /// Alert rate per minute over the trailing rate window.
    pub fn alerts_per_min(&self, rate_window_seconds: f64) -> f64 {
        if rate_window_seconds <= 0.0 {
            return 0.0;
        }
        let now = Instant::now();
        #[allow(clippy::cast_precision_loss)]
        let recent = self
            .arrival_times
            .iter()
            .filter(|t| now.duration_since(**t).as_secs_f64() <= rate_window_seconds)
            .count() as f64;
        recent * (60.0 / rate_window_seconds)
    }

    pub fn len(&self) -> usize {
        self.latencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latencies.is_empty()
    }
}

// ============================================================================
// Reporting — format + periodic emission
// ============================================================================

/// The standard latency summary log line (values to 1 decimal place).
pub fn format_latency_summary(p50: f64, p99: f64, alerts_per_min: f64) -> String {
    format!("Latency P50: {p50:.1}ms | P99: {p99:.1}ms | Alerts/min: {alerts_per_min:.1}")
}

/// Drives periodic latency summaries without blocking the pipeline.
///
/// Callers invoke [`maybe_report`](Self::maybe_report) on every alert; a
/// summary is logged at most once per interval and skipped silently while
/// the collector is empty.
pub struct MetricsReporter {
    interval_seconds: f64,
    last_report: Instant,
}

impl MetricsReporter {
    pub fn new(interval_seconds: u64) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let interval_seconds = interval_seconds as f64;
        Self {
            interval_seconds,
            last_report: Instant::now(),
        }
    }

    /// Log a summary if the interval has elapsed. Returns whether one was
    /// emitted.
    pub fn maybe_report(&mut self, collector: &LatencyCollector) -> bool {
        if collector.is_empty() {
            return false;
        }
        let now = Instant::now();
        if now.duration_since(self.last_report).as_secs_f64() < self.interval_seconds {
            return false;
        }
        self.last_report = now;
        info!(
            "{}",
            format_latency_summary(
                collector.p50(),
                collector.p99(),
                collector.alerts_per_min(RATE_WINDOW_SECONDS),
            )
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_of_empty_is_zero() {
        assert_eq!(compute_percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn percentile_of_single_sample_is_that_sample() {
        assert_eq!(compute_percentile(&[42.0], 99.0), 42.0);
    }

    #[test]
    fn median_interpolates_between_middle_values() {
        assert_eq!(compute_percentile(&[1.0, 2.0, 3.0, 4.0], 50.0), 2.5);
        assert_eq!(compute_percentile(&[3.0, 1.0, 2.0], 50.0), 2.0);
    }

    #[test]
    fn p0_and_p100_are_min_and_max() {
        let data = [9.0, 1.0, 5.0];
        assert_eq!(compute_percentile(&data, 0.0), 1.0);
        assert_eq!(compute_percentile(&data, 100.0), 9.0);
    }

    #[test]
    fn collector_caps_at_capacity() {
        let mut c = LatencyCollector::new(3);
        for i in 0..5 {
            c.record(f64::from(i));
        }
        assert_eq!(c.len(), 3);
        // Oldest evicted: median of [2, 3, 4]
        assert_eq!(c.p50(), 3.0);
    }

    #[test]
    fn rate_counts_recent_samples() {
        let mut c = LatencyCollector::new(10);
        c.record(1.0);
        c.record(2.0);
        // Both samples just arrived: 2 in a 60 s window → 2/min.
        assert_eq!(c.alerts_per_min(60.0), 2.0);
        assert_eq!(c.alerts_per_min(0.0), 0.0);
    }

    #[test]
    fn summary_format_is_stable() {
        assert_eq!(
            format_latency_summary(12.34, 99.99, 4.2),
            "Latency P50: 12.3ms | P99: 100.0ms | Alerts/min: 4.2"
        );
    }

    #[test]
    fn reporter_skips_empty_collector() {
        let collector = LatencyCollector::default();
        let mut reporter = MetricsReporter::new(0);
        assert!(!reporter.maybe_report(&collector));
    }

    #[test]
    fn reporter_respects_interval() {
        let mut collector = LatencyCollector::default();
        collector.record(5.0);
        let mut reporter = MetricsReporter::new(3600);
        // First call is inside the interval (timer starts at construction).
        assert!(!reporter.maybe_report(&collector));
    }

    #[test]
    fn reporter_emits_after_interval() {
        let mut collector = LatencyCollector::default();
        collector.record(5.0);
        let mut reporter = MetricsReporter::new(0);
        assert!(reporter.maybe_report(&collector));
    }
}
