//! System-wide KPI aggregator feeding the metrics JSON snapshot.
//!
//! Tracks running totals (events, confirmed anomalies), the event-time
//! rolling average ERI, the set of discharge points still inside their
//! alert cooldown, the highest active risk band, and pipeline uptime.
//!
//! "Currently" is event time, not wall time: a replayed stream reports the
//! same KPIs as a live one.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use chrono::{Duration, NaiveDateTime};

use crate::config::defaults::AVG_ERI_WINDOW_MINUTES;
use crate::config::Settings;
use crate::types::{parse_event_time, AlertRecord, EriReading, MetricsSnapshot, RiskBand};

pub struct MetricsAggregator {
    started: Instant,
    events_processed: u64,
    anomalies_detected: u64,
    last_event_timestamp: Option<String>,
    last_event_ts: Option<NaiveDateTime>,
    /// (event time, eri) samples, pruned to the rolling KPI window.
    eri_samples: VecDeque<(NaiveDateTime, f64)>,
    /// Last emitted alert per discharge point.
    alerts: HashMap<String, (NaiveDateTime, RiskBand)>,
    cooldown_seconds: i64,
    time_format: String,
}

impl MetricsAggregator {
    pub fn new(settings: &Settings) -> Self {
        Self {
            started: Instant::now(),
            events_processed: 0,
            anomalies_detected: 0,
            last_event_timestamp: None,
            last_event_ts: None,
            eri_samples: VecDeque::new(),
            alerts: HashMap::new(),
            cooldown_seconds: settings.alert_cooldown_seconds,
            time_format: settings.input_time_format.clone(),
        }
    }

    /// Count one input event and advance the event clock.
    pub fn record_event(&mut self, timestamp: &str) {
        self.events_processed += 1;
        if let Some(ts) = parse_event_time(timestamp, &self.time_format) {
            if self.last_event_ts.map_or(true, |last| ts >= last) {
                self.last_event_ts = Some(ts);
                self.last_event_timestamp = Some(timestamp.to_string());
            }
        }
        self.prune_eri_window();
    }

    pub fn record_anomaly(&mut self) {
        self.anomalies_detected += 1;
    }

    pub fn record_eri(&mut self, row: &EriReading) {
        if let Some(ts) = parse_event_time(&row.timestamp, &self.time_format) {
            self.eri_samples.push_back((ts, row.eri));
        }
        self.prune_eri_window();
    }

    pub fn record_alert(&mut self, alert: &AlertRecord) {
        if let Some(ts) = parse_event_time(&alert.timestamp, &self.time_format) {
            self.alerts
                .insert(alert.discharge_point_id.clone(), (ts, alert.risk_band));
        }
    }

    /// Produce the KPI snapshot for the atomic metrics file.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let active = self.active_alerts();
        let highest = active
            .iter()
            .map(|(_, band)| *band)
            .max_by_key(|band| band.rank());

        MetricsSnapshot {
            events_processed_total: self.events_processed,
            anomalies_detected_total: self.anomalies_detected,
            active_alerts_count: active.len() as u64,
            avg_eri_last_5min: self.avg_eri(),
            highest_risk_band: highest.map_or_else(|| "NONE".to_string(), |b| b.to_string()),
            pipeline_uptime_seconds: self.started.elapsed().as_secs_f64(),
            last_event_timestamp: self.last_event_timestamp.clone(),
        }
    }

    /// Discharge points whose last alert is within the cooldown window of
    /// the event clock.
    fn active_alerts(&self) -> Vec<(&String, RiskBand)> {
        let (Some(now), true) = (self.last_event_ts, self.cooldown_seconds > 0) else {
            return Vec::new();
        };
        self.alerts
            .iter()
            .filter(|(_, (ts, _))| (now - *ts).num_seconds() < self.cooldown_seconds)
            .map(|(point, (_, band))| (point, *band))
            .collect()
    }

    fn avg_eri(&self) -> f64 {
        if self.eri_samples.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.eri_samples.len() as f64;
        self.eri_samples.iter().map(|(_, eri)| eri).sum::<f64>() / n
    }

    fn prune_eri_window(&mut self) {
        let Some(now) = self.last_event_ts else {
            return;
        };
        let cutoff = now - Duration::minutes(AVG_ERI_WINDOW_MINUTES);
        while let Some((ts, _)) = self.eri_samples.front() {
            if *ts < cutoff {
                self.eri_samples.pop_front();
            } else {
                break;
            }
        }
    }
}
