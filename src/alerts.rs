//! Risk-gated alert router.
//!
//! Three gates, in order:
//!
//! 1. **Band filter** — drop rows whose band rank is below the configured
//!    minimum.
//! 2. **Cooldown** — drop rows for a discharge point that alerted within
//!    the last cooldown window. Zero disables suppression; unparseable
//!    timestamps pass through (safe bias) and never update the store.
//! 3. **Level + masking** — map band to operator level; MEDIUM rows carry
//!    only the minimal field set (extra strings emptied, floats zeroed).

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::config::Settings;
use crate::types::{parse_event_time, AlertLevel, AlertRecord, EriReading, RiskBand};

/// Tracks last-alert event times to suppress re-alerts per discharge point.
struct CooldownStore {
    last_alert: HashMap<String, NaiveDateTime>,
    cooldown_seconds: i64,
    time_format: String,
}

impl CooldownStore {
    fn can_alert(&self, discharge_point_id: &str, timestamp: &str) -> bool {
        if self.cooldown_seconds == 0 {
            return true;
        }
        let Some(now) = parse_event_time(timestamp, &self.time_format) else {
            return true; // unparseable timestamp never suppressed
        };
        match self.last_alert.get(discharge_point_id) {
            None => true,
            Some(last) => (now - *last).num_seconds() >= self.cooldown_seconds,
        }
    }

    fn record(&mut self, discharge_point_id: &str, timestamp: &str) {
        if let Some(ts) = parse_event_time(timestamp, &self.time_format) {
            self.last_alert.insert(discharge_point_id.to_string(), ts);
        }
        // bad timestamp: leave the previous entry intact
    }
}

pub struct AlertRouter {
    min_band_rank: u8,
    cooldown: CooldownStore,
}

impl AlertRouter {
    pub fn new(settings: &Settings) -> Self {
        Self {
            min_band_rank: settings.alert_min_risk_band.rank(),
            cooldown: CooldownStore {
                last_alert: HashMap::new(),
                cooldown_seconds: settings.alert_cooldown_seconds,
                time_format: settings.input_time_format.clone(),
            },
        }
    }

    /// Route one ERI row. Returns the alert when all gates pass.
    pub fn route(&mut self, row: &EriReading) -> Option<AlertRecord> {
        // Gate 1 — band threshold
        if row.risk_band.rank() < self.min_band_rank {
            return None;
        }

        // Gate 2 — per-point cooldown
        if !self.cooldown.can_alert(&row.discharge_point_id, &row.timestamp) {
            return None;
        }
        self.cooldown.record(&row.discharge_point_id, &row.timestamp);

        // Gate 3 — level assignment and MEDIUM masking
        let full = row.risk_band.rank() >= RiskBand::High.rank();
        Some(AlertRecord {
            discharge_point_id: row.discharge_point_id.clone(),
            timestamp: row.timestamp.clone(),
            eri: row.eri,
            risk_band: row.risk_band,
            alert_level: AlertLevel::from_band(row.risk_band),
            sensitivity_factor: if full { row.sensitivity_factor } else { 0.0 },
            top_contributor: if full {
                row.top_contributor.clone()
            } else {
                String::new()
            },
            alert_message: if full {
                row.alert_message.clone()
            } else {
                String::new()
            },
        })
    }
}
