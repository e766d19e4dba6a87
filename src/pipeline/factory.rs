//! Factory path: validator → windowed stats → z-score → persistence →
//! multivariate → attribution → ERI → alert router → alert sink.
//!
//! One instance owns all stage state (window tables, persistence counters,
//! sync buckets, cooldown store); rows arrive strictly in file order, so
//! per-sensor and per-group event order hold by construction.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{error, info, warn};

use super::metrics_hub::MetricsHub;
use super::processing_loop::StreamStage;
use crate::alerts::AlertRouter;
use crate::config::Settings;
use crate::eri::EriScorer;
use crate::metrics::{LatencyCollector, MetricsReporter};
use crate::scoring::{format_alert, GroupAggregator, PersistenceGate, ZScorer};
use crate::sinks::JsonlSink;
use crate::stats::WindowedStats;
use crate::types::{FactoryRow, GroupRow, Reading, RowStatus};
use crate::validator;

pub struct FactoryPipeline {
    settings: Settings,
    stats: WindowedStats,
    scorer: ZScorer,
    gate: PersistenceGate,
    aggregator: GroupAggregator,
    eri: EriScorer,
    router: AlertRouter,
    alert_sink: JsonlSink,
    quarantine_sink: Arc<Mutex<JsonlSink>>,
    metrics: Arc<MetricsHub>,
    latency: LatencyCollector,
    reporter: MetricsReporter,
}

impl FactoryPipeline {
    pub fn new(
        settings: &Settings,
        quarantine_sink: Arc<Mutex<JsonlSink>>,
        metrics: Arc<MetricsHub>,
    ) -> Self {
        Self {
            settings: settings.clone(),
            stats: WindowedStats::new(settings),
            scorer: ZScorer::new(settings),
            gate: PersistenceGate::new(settings),
            aggregator: GroupAggregator::new(settings),
            eri: EriScorer::new(settings),
            router: AlertRouter::new(settings),
            alert_sink: JsonlSink::new(&settings.alert_log_path),
            quarantine_sink,
            metrics,
            latency: LatencyCollector::default(),
            reporter: MetricsReporter::new(settings.metrics_interval_seconds),
        }
    }

    fn handle_row(&mut self, row: &FactoryRow) {
        let started = Instant::now();
        self.metrics.record_event(&row.time);

        // BLACKOUT rows carry no scorable channels; the anti-cheat runner
        // consumes them from the full stream.
        if row.status == RowStatus::Blackout {
            return;
        }

        for reading in row.channel_readings() {
            self.handle_reading(&reading, started);
        }
        self.metrics.maybe_snapshot();
    }

    fn handle_reading(&mut self, reading: &Reading, started: Instant) {
        if let Err(reason) = validator::validate_reading(reading, &self.settings) {
            warn!(
                sensor_id = %reading.sensor_id,
                reason = %reason,
                "factory reading quarantined"
            );
            let record = validator::quarantine(reading, reason);
            if let Ok(mut sink) = self.quarantine_sink.lock() {
                if let Err(e) = sink.append(&record) {
                    error!("quarantine sink write failed: {e}");
                }
            }
            return;
        }

        // Window accounting happens before the stats join, so a sensor's
        // very first readings build its baseline even though they cannot be
        // scored yet.
        self.stats.observe(reading);
        let Some(window) = self.stats.latest_stats(&reading.sensor_id) else {
            return;
        };
        let Some(scored) = self.scorer.score(reading, window) else {
            return;
        };
        let Some(confirmed) = self.gate.observe(&scored) else {
            return;
        };
        self.metrics.record_anomaly();

        if let Some(group_row) = self.aggregator.observe(&confirmed) {
            self.handle_group_row(group_row, started);
        }
    }

    fn handle_group_row(&mut self, group_row: GroupRow, started: Instant) {
        let attributed = format_alert(group_row);
        let eri_row = self.eri.score(attributed);
        self.metrics.record_eri(&eri_row);

        let Some(alert) = self.router.route(&eri_row) else {
            return;
        };
        if let Err(e) = self.alert_sink.append(&alert) {
            error!("alert sink write failed: {e}");
        }
        info!(
            "[ALERT] {} | Point: {} | ERI: {:.1} | Band: {} | Level: {}",
            alert.timestamp, alert.discharge_point_id, alert.eri, alert.risk_band, alert.alert_level,
        );
        self.metrics.record_alert(&alert);
        #[allow(clippy::cast_precision_loss)]
        self.latency.record(started.elapsed().as_micros() as f64 / 1000.0);
        self.reporter.maybe_report(&self.latency);
    }
}

impl StreamStage<FactoryRow> for FactoryPipeline {
    fn process(&mut self, row: FactoryRow) {
        self.handle_row(&row);
    }

    fn flush(&mut self) {
        // Leftover windows only refresh per-sensor baselines; the open sync
        // buckets still owe their group rows.
        self.stats.flush();
        let started = Instant::now();
        for group_row in self.aggregator.flush() {
            self.handle_group_row(group_row, started);
        }
        self.alert_sink.close();
        self.metrics.maybe_snapshot();
    }
}
