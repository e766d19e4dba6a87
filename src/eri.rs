//! Environmental Risk Index: composite score × river sensitivity × severity.
//!
//! The river sensitivity table maps discharge points to how fragile their
//! receiving stretch is. Unknown points get the default factor and are
//! flagged `unknown_sensitivity` with a warning log. Band classification
//! walks the strictly ascending threshold list; anything above the highest
//! threshold is CRITICAL.

use std::collections::BTreeMap;

use tracing::warn;

use crate::config::Settings;
use crate::types::{AttributedAnomaly, EriReading, RiskBand};

pub struct EriScorer {
    river_sensitivity: BTreeMap<String, f64>,
    default_sensitivity: f64,
    severity_multiplier: f64,
    /// `(upper_bound_exclusive, band)` in ascending order.
    thresholds: [(f64, RiskBand); 3],
}

impl EriScorer {
    pub fn new(settings: &Settings) -> Self {
        Self {
            river_sensitivity: settings.river_sensitivity.clone(),
            default_sensitivity: settings.default_sensitivity,
            severity_multiplier: settings.severity_multiplier,
            thresholds: [
                (settings.eri_threshold_low, RiskBand::Low),
                (settings.eri_threshold_medium, RiskBand::Medium),
                (settings.eri_threshold_high, RiskBand::High),
            ],
        }
    }

    /// Compute the ERI row for an attributed group anomaly. The group name
    /// doubles as the discharge point id — the two share a namespace.
    pub fn score(&self, anomaly: AttributedAnomaly) -> EriReading {
        let discharge_point_id = anomaly.group.group_name.clone();
        let (sensitivity_factor, unknown_sensitivity) = self.lookup(&discharge_point_id);
        let eri = anomaly.group.composite_score * sensitivity_factor * self.severity_multiplier;

        EriReading {
            discharge_point_id,
            timestamp: anomaly.group.timestamp.clone(),
            composite_score: anomaly.group.composite_score,
            sensitivity_factor,
            eri,
            risk_band: self.classify(eri),
            unknown_sensitivity,
            top_contributor: anomaly.top_contributor,
            attribution_detail: anomaly.attribution_detail,
            alert_message: anomaly.alert_message,
        }
    }

    /// Classify an ERI value: first threshold the value is below wins.
    pub fn classify(&self, eri: f64) -> RiskBand {
        for &(upper_bound, band) in &self.thresholds {
            if eri < upper_bound {
                return band;
            }
        }
        RiskBand::Critical
    }

    fn lookup(&self, discharge_point_id: &str) -> (f64, bool) {
        if let Some(&factor) = self.river_sensitivity.get(discharge_point_id) {
            return (factor, false);
        }
        warn!(
            discharge_point_id,
            default_sensitivity = self.default_sensitivity,
            "unknown discharge point — default sensitivity applied"
        );
        (self.default_sensitivity, true)
    }
}
