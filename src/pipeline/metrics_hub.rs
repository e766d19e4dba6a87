//! Shared metrics state for both processing paths.
//!
//! Wraps the KPI aggregator and the snapshot cadence behind one mutex so
//! the CETP and factory loops can tap it concurrently without owning each
//! other's state. Lock scope is a handful of counter updates — contention
//! is negligible at pipeline rates.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::error;

use crate::config::Settings;
use crate::metrics::MetricsAggregator;
use crate::sinks::write_snapshot_atomic;
use crate::types::{AlertRecord, EriReading};

pub struct MetricsHub {
    inner: Mutex<Inner>,
}

struct Inner {
    aggregator: MetricsAggregator,
    snapshot_path: PathBuf,
    snapshot_interval: Duration,
    last_snapshot: Instant,
}

impl MetricsHub {
    pub fn new(settings: &Settings) -> Self {
        Self {
            inner: Mutex::new(Inner {
                aggregator: MetricsAggregator::new(settings),
                snapshot_path: PathBuf::from(&settings.metrics_output_path),
                snapshot_interval: Duration::from_secs(settings.metrics_interval_seconds),
                last_snapshot: Instant::now(),
            }),
        }
    }

    pub fn record_event(&self, timestamp: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.aggregator.record_event(timestamp);
        }
    }

    pub fn record_anomaly(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.aggregator.record_anomaly();
        }
    }

    pub fn record_eri(&self, row: &EriReading) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.aggregator.record_eri(row);
        }
    }

    pub fn record_alert(&self, alert: &AlertRecord) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.aggregator.record_alert(alert);
        }
    }

    /// Write the KPI snapshot if the interval has elapsed.
    pub fn maybe_snapshot(&self) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if inner.last_snapshot.elapsed() < inner.snapshot_interval {
            return;
        }
        inner.last_snapshot = Instant::now();
        inner.write();
    }

    /// Unconditional snapshot — shutdown path.
    pub fn final_snapshot(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.write();
        }
    }
}

impl Inner {
    fn write(&mut self) {
        let snapshot = self.aggregator.snapshot();
        if let Err(e) = write_snapshot_atomic(&self.snapshot_path, &snapshot) {
            // The writer already cleaned its temp file; next interval retries.
            error!("metrics snapshot write failed: {e}");
        }
    }
}
