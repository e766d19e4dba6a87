//! Sensor reading types shared across the pipeline stages.

use serde::{Deserialize, Serialize};

/// NORMAL / BLACKOUT tag attached to every factory row at ingest.
///
/// BLACKOUT marks a null primary (COD) value — intentional sensor silence
/// that the blackout tamper detector feeds on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RowStatus {
    Normal,
    Blackout,
}

/// A single per-channel sensor sample flowing through the analytic path.
///
/// Factory rows fan out into one `Reading` per non-null channel
/// (`FACTORY_A_cod`, `FACTORY_A_tss`, …); the CETP inlet COD channel flows
/// through the same shape. `value` is `None` only for BLACKOUT context rows,
/// which never enter the scored path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub sensor_id: String,
    /// Event time string in the configured input format.
    pub timestamp: String,
    pub value: Option<f64>,
    // Auxiliary channels carried on factory primary (COD) readings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bod: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ph: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tss: Option<f64>,
}

impl Reading {
    pub fn new(sensor_id: impl Into<String>, timestamp: impl Into<String>, value: f64) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            timestamp: timestamp.into(),
            value: Some(value),
            bod: None,
            ph: None,
            tss: None,
        }
    }
}

/// A reading that failed validation, persisted to the quarantine log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantineRecord {
    pub sensor_id: String,
    pub timestamp: String,
    pub value: Option<f64>,
    pub rejection_reason: String,
    /// ISO-8601 UTC arrival time.
    pub received_at: String,
}

/// One raw CETP inlet/outlet row as read from the MPCB export CSV.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CetpRow {
    pub s_no: u64,
    pub time: String,
    pub cetp_inlet_cod: Option<f64>,
    pub cetp_inlet_bod: Option<f64>,
    pub cetp_inlet_ph: Option<f64>,
    pub cetp_inlet_tss: Option<f64>,
    pub cetp_outlet_cod: Option<f64>,
    pub cetp_outlet_bod: Option<f64>,
    pub cetp_outlet_ph: Option<f64>,
    pub cetp_outlet_tss: Option<f64>,
}

/// One raw factory discharge row, tagged NORMAL or BLACKOUT at ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactoryRow {
    pub s_no: u64,
    pub time: String,
    pub factory_id: String,
    pub cod: Option<f64>,
    pub bod: Option<f64>,
    pub ph: Option<f64>,
    pub tss: Option<f64>,
    pub status: RowStatus,
}

impl FactoryRow {
    /// Fan the row out into one per-channel reading per non-null value.
    ///
    /// The COD reading carries the auxiliary channels so downstream
    /// consumers (backtrack evidence, anti-cheat echoes) see the full row.
    pub fn channel_readings(&self) -> Vec<Reading> {
        let mut readings = Vec::with_capacity(4);
        if let Some(cod) = self.cod {
            readings.push(Reading {
                sensor_id: format!("{}_cod", self.factory_id),
                timestamp: self.time.clone(),
                value: Some(cod),
                bod: self.bod,
                ph: self.ph,
                tss: self.tss,
            });
        }
        for (channel, value) in [("bod", self.bod), ("ph", self.ph), ("tss", self.tss)] {
            if let Some(v) = value {
                readings.push(Reading::new(
                    format!("{}_{channel}", self.factory_id),
                    self.time.clone(),
                    v,
                ));
            }
        }
        readings
    }
}

/// Per-(sensor, window) aggregate emitted by the windowed stats stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowStats {
    pub sensor_id: String,
    pub window_start: String,
    pub window_end: String,
    pub mean: f64,
    /// Population std from E[X²] − E[X]², clamped at 0 and ε-floored.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub sample_count: u64,
}

/// Reading joined with its sensor's most recent window statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredReading {
    pub sensor_id: String,
    pub timestamp: String,
    pub value: f64,
    pub rolling_mean: f64,
    pub rolling_std: f64,
    pub z_score: f64,
    pub is_anomaly: bool,
}

/// A scored reading whose sensor has sustained its anomaly streak.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmedAnomaly {
    pub sensor_id: String,
    pub timestamp: String,
    pub consecutive_count: u32,
    pub z_score: f64,
    pub value: f64,
}
