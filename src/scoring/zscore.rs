//! Z-score scorer: joins a reading with its sensor's most recent window
//! statistics.
//!
//! `z = (value − rolling_mean) / (rolling_std + ε)`. The anomaly comparison
//! is strictly greater-than — a |z| exactly at the threshold is normal.
//! A sensor with no emitted window yet is skipped for scoring; the reading
//! has already been counted toward its windows by the stats stage.

use crate::config::Settings;
use crate::types::{Reading, ScoredReading, WindowStats};

pub struct ZScorer {
    threshold: f64,
    epsilon: f64,
}

impl ZScorer {
    pub fn new(settings: &Settings) -> Self {
        Self {
            threshold: settings.zscore_threshold,
            epsilon: settings.epsilon,
        }
    }

    /// Score a reading against its window stats. Returns `None` for null
    /// values (BLACKOUT context never reaches here in practice).
    pub fn score(&self, reading: &Reading, stats: &WindowStats) -> Option<ScoredReading> {
        let value = reading.value?;
        let z_score = (value - stats.mean) / (stats.std + self.epsilon);
        Some(ScoredReading {
            sensor_id: reading.sensor_id.clone(),
            timestamp: reading.timestamp.clone(),
            value,
            rolling_mean: stats.mean,
            rolling_std: stats.std,
            z_score,
            is_anomaly: z_score.abs() > self.threshold,
        })
    }
}
