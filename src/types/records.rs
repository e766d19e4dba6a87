//! Downstream event and audit record types.

use serde::{Deserialize, Serialize};

use super::bands::{AlertLevel, RiskBand};

/// One emitted (group, sync bucket) row from the multivariate aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRow {
    pub group_name: String,
    /// Effective bucket timestamp: the latest contributing reading's time.
    pub timestamp: String,
    /// Root-mean-square of the contributing z-scores.
    pub composite_score: f64,
    /// `(sensor_id, z_score)` pairs in group member order.
    pub sensor_z_scores: Vec<(String, f64)>,
    pub contributing: Vec<String>,
    pub missing: Vec<String>,
    pub is_group_anomaly: bool,
}

/// Group row enriched with causal attribution fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributedAnomaly {
    #[serde(flatten)]
    pub group: GroupRow,
    /// Sensor with the largest z² share; empty when no contributors.
    pub top_contributor: String,
    /// JSON object `{sensor_id: fraction}`, 3 dp, descending by fraction.
    pub attribution_detail: String,
    pub alert_message: String,
}

/// Attributed anomaly scaled against river sensitivity into an ERI row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EriReading {
    pub discharge_point_id: String,
    pub timestamp: String,
    pub composite_score: f64,
    pub sensitivity_factor: f64,
    pub eri: f64,
    pub risk_band: RiskBand,
    pub unknown_sensitivity: bool,
    pub top_contributor: String,
    pub attribution_detail: String,
    pub alert_message: String,
}

/// A routed alert that passed band threshold and cooldown gating.
///
/// MEDIUM rows carry masked extras (strings emptied, floats zeroed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub discharge_point_id: String,
    pub timestamp: String,
    pub eri: f64,
    pub risk_band: RiskBand,
    pub alert_level: AlertLevel,
    pub sensitivity_factor: f64,
    pub top_contributor: String,
    pub alert_message: String,
}

/// CETP inlet COD breach emitted by the tripwire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShockEvent {
    pub time: String,
    pub cod_value: f64,
    /// COD minus the configured baseline (positive = above baseline).
    pub breach_mag: f64,
    /// "HIGH" at ≥ 2× baseline, otherwise "MEDIUM".
    pub alert_level: String,
}

/// The append-only attribution record, one per CETP shock.
///
/// Null attribution fields mean no factory row fell inside the backtrack
/// window — that outcome is still logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRecord {
    /// ISO-8601 UTC write time.
    pub logged_at: String,
    pub cetp_event_time: String,
    pub cetp_cod: f64,
    pub breach_mag: f64,
    pub alert_level: String,
    pub backtrack_time: String,
    pub attributed_factory: Option<String>,
    pub factory_cod: Option<f64>,
    pub factory_bod: Option<f64>,
    pub factory_tss: Option<f64>,
}

/// Categorical tamper label for anti-cheat detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TamperType {
    #[serde(rename = "ZERO_VARIANCE")]
    ZeroVariance,
    #[serde(rename = "DILUTION_TAMPER")]
    DilutionTamper,
    #[serde(rename = "BLACKOUT_TAMPER")]
    BlackoutTamper,
}

impl std::fmt::Display for TamperType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ZeroVariance => "ZERO_VARIANCE",
            Self::DilutionTamper => "DILUTION_TAMPER",
            Self::BlackoutTamper => "BLACKOUT_TAMPER",
        };
        f.write_str(s)
    }
}

/// Detector-specific evidence fields, flattened into the tamper record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TamperDetail {
    ZeroVariance {
        cod_max: f64,
        cod_min: f64,
        cod_range: f64,
        row_count: u64,
    },
    Dilution {
        mean_cod: f64,
        mean_tss: f64,
        baseline_cod: f64,
        baseline_tss: f64,
    },
    Blackout {
        total_rows: u64,
        blackout_rows: u64,
        blackout_ratio: f64,
    },
}

/// One anti-cheat detection, stamped `logged_at` at write time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TamperRecord {
    pub tamper_type: TamperType,
    pub factory_id: String,
    pub window_end: String,
    #[serde(flatten)]
    pub detail: TamperDetail,
}

/// Point-in-time KPI snapshot written atomically to the metrics file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub events_processed_total: u64,
    pub anomalies_detected_total: u64,
    pub active_alerts_count: u64,
    pub avg_eri_last_5min: f64,
    /// Highest band among alerts still in cooldown, or "NONE".
    pub highest_risk_band: String,
    pub pipeline_uptime_seconds: f64,
    pub last_event_timestamp: Option<String>,
}
