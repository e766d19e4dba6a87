//! CETP path: validator → tripwire → backtrack → evidence sink.
//!
//! One instance owns every piece of state this path touches; the processing
//! loop feeds it rows strictly in file order, which preserves CETP event
//! order end to end.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{error, info, warn};

use super::metrics_hub::MetricsHub;
use super::processing_loop::StreamStage;
use crate::backtrack::Backtracker;
use crate::config::Settings;
use crate::metrics::{LatencyCollector, MetricsReporter};
use crate::sinks::JsonlSink;
use crate::tripwire::Tripwire;
use crate::types::{CetpRow, EvidenceRecord, Reading};
use crate::validator;
use crate::webhook::WebhookDispatcher;

/// Sensor id under which CETP inlet COD readings are validated.
const INLET_COD_SENSOR: &str = "CETP_INLET_cod";

pub struct CetpPipeline {
    settings: Settings,
    tripwire: Tripwire,
    backtracker: Backtracker,
    evidence_sink: JsonlSink,
    quarantine_sink: Arc<Mutex<JsonlSink>>,
    webhook: Option<WebhookDispatcher>,
    metrics: Arc<MetricsHub>,
    latency: LatencyCollector,
    reporter: MetricsReporter,
}

impl CetpPipeline {
    pub fn new(
        settings: &Settings,
        backtracker: Backtracker,
        quarantine_sink: Arc<Mutex<JsonlSink>>,
        metrics: Arc<MetricsHub>,
    ) -> Self {
        Self {
            settings: settings.clone(),
            tripwire: Tripwire::new(settings),
            backtracker,
            evidence_sink: JsonlSink::new(&settings.evidence_log_path),
            quarantine_sink,
            webhook: WebhookDispatcher::from_url(settings.webhook_url.as_deref()),
            metrics,
            latency: LatencyCollector::default(),
            reporter: MetricsReporter::new(settings.metrics_interval_seconds),
        }
    }

    fn handle_row(&mut self, row: &CetpRow) {
        let started = Instant::now();
        self.metrics.record_event(&row.time);

        // Null inlet COD is a sensor gap, not a shock candidate.
        let Some(cod) = row.cetp_inlet_cod else {
            return;
        };

        let reading = Reading::new(INLET_COD_SENSOR, row.time.clone(), cod);
        if let Err(reason) = validator::validate_reading(&reading, &self.settings) {
            warn!(time = %row.time, reason = %reason, "CETP reading quarantined");
            let record = validator::quarantine(&reading, reason);
            if let Ok(mut sink) = self.quarantine_sink.lock() {
                if let Err(e) = sink.append(&record) {
                    error!("quarantine sink write failed: {e}");
                }
            }
            return;
        }

        let Some(shock) = self.tripwire.check(&row.time, cod) else {
            return;
        };
        let Some(evidence) = self.backtracker.attribute(&shock) else {
            return;
        };

        self.emit(&evidence);
        #[allow(clippy::cast_precision_loss)]
        self.latency.record(started.elapsed().as_micros() as f64 / 1000.0);
        self.reporter.maybe_report(&self.latency);
        self.metrics.maybe_snapshot();
    }

    fn emit(&mut self, evidence: &EvidenceRecord) {
        if let Err(e) = self.evidence_sink.append(evidence) {
            error!("evidence sink write failed: {e}");
        }
        info!(
            "[ALERT] {} | Factory: {} | COD: {} mg/L | Level: {}",
            evidence.cetp_event_time,
            evidence.attributed_factory.as_deref().unwrap_or("UNATTRIBUTED"),
            evidence.cetp_cod,
            evidence.alert_level,
        );
        if let Some(webhook) = &self.webhook {
            webhook.dispatch(evidence);
        }
    }
}

impl StreamStage<CetpRow> for CetpPipeline {
    fn process(&mut self, row: CetpRow) {
        self.handle_row(&row);
    }

    fn flush(&mut self) {
        self.evidence_sink.close();
        self.metrics.maybe_snapshot();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtrack::FactoryIndex;
    use crate::types::{FactoryRow, RowStatus};

    fn cetp_row(time: &str, cod: Option<f64>) -> CetpRow {
        CetpRow {
            s_no: 1,
            time: time.to_string(),
            cetp_inlet_cod: cod,
            cetp_inlet_bod: None,
            cetp_inlet_ph: None,
            cetp_inlet_tss: None,
            cetp_outlet_cod: None,
            cetp_outlet_bod: None,
            cetp_outlet_ph: None,
            cetp_outlet_tss: None,
        }
    }

    fn factory_row(factory: &str, time: &str, cod: f64) -> FactoryRow {
        FactoryRow {
            s_no: 0,
            time: time.to_string(),
            factory_id: factory.to_string(),
            cod: Some(cod),
            bod: Some(cod / 3.0),
            ph: Some(7.0),
            tss: Some(cod / 2.0),
            status: RowStatus::Normal,
        }
    }

    fn pipeline(dir: &std::path::Path, factory_rows: Vec<FactoryRow>) -> CetpPipeline {
        let settings = Settings {
            evidence_log_path: dir.join("evidence.jsonl").to_string_lossy().into_owned(),
            quarantine_log_path: dir.join("quarantine.jsonl").to_string_lossy().into_owned(),
            metrics_output_path: dir.join("metrics.json").to_string_lossy().into_owned(),
            ..Settings::default()
        };
        let index = FactoryIndex::from_rows(&factory_rows, &settings);
        let quarantine = Arc::new(Mutex::new(JsonlSink::new(&settings.quarantine_log_path)));
        let metrics = Arc::new(MetricsHub::new(&settings));
        CetpPipeline::new(
            &settings,
            Backtracker::new(index, &settings),
            quarantine,
            metrics,
        )
    }

    /// Baseline readings below threshold leave the evidence log empty.
    #[test]
    fn baseline_pass_emits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = pipeline(dir.path(), vec![]);
        for (i, cod) in [180.0, 190.0, 185.0].iter().enumerate() {
            p.process(cetp_row(&format!("2026-02-01 12:0{i}"), Some(*cod)));
        }
        p.flush();
        assert!(!dir.path().join("evidence.jsonl").exists());
    }

    /// A shock backtracks to the highest-COD factory row 15 minutes back.
    #[test]
    fn shock_attributes_matching_factory() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = pipeline(
            dir.path(),
            vec![
                factory_row("FACTORY_A", "2026-02-01 12:07", 220.0),
                factory_row("FACTORY_B", "2026-02-01 12:08", 450.0),
            ],
        );
        p.process(cetp_row("2026-02-01 12:23", Some(260.0)));
        p.flush();

        let content = std::fs::read_to_string(dir.path().join("evidence.jsonl")).unwrap();
        let record: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(record["attributed_factory"], "FACTORY_B");
        assert_eq!(record["factory_cod"], 450.0);
        assert_eq!(record["backtrack_time"], "2026-02-01 12:08");
    }

    /// No factory rows near the backtrack time → null attribution, logged.
    #[test]
    fn shock_without_match_logs_null_attribution() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = pipeline(dir.path(), vec![]);
        p.process(cetp_row("2026-02-01 13:00", Some(280.0)));
        p.flush();

        let content = std::fs::read_to_string(dir.path().join("evidence.jsonl")).unwrap();
        let record: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert!(record["attributed_factory"].is_null());
        assert!(record["factory_cod"].is_null());
        assert_eq!(record["backtrack_time"], "2026-02-01 12:45");
    }

    #[test]
    fn invalid_reading_is_quarantined_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = pipeline(dir.path(), vec![]);
        // Inlet COD outside the catch-all range.
        p.process(cetp_row("2026-02-01 12:00", Some(5e7)));
        p.flush();

        assert!(!dir.path().join("evidence.jsonl").exists());
        let content = std::fs::read_to_string(dir.path().join("quarantine.jsonl")).unwrap();
        let record: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(record["sensor_id"], "CETP_INLET_cod");
        assert!(record["rejection_reason"]
            .as_str()
            .unwrap()
            .contains("out of range"));
    }

    #[test]
    fn null_inlet_cod_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = pipeline(dir.path(), vec![]);
        p.process(cetp_row("2026-02-01 12:00", None));
        p.flush();
        assert!(!dir.path().join("evidence.jsonl").exists());
        assert!(!dir.path().join("quarantine.jsonl").exists());
    }
}
