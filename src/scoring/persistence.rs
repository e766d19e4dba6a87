//! Persistence gate: confirmed-anomaly filtering by consecutive streak.
//!
//! Maintains a per-sensor consecutive counter. The counter increments on
//! every anomalous reading and resets to zero on the first normal reading;
//! every reset is logged at DEBUG so operators can confirm the gate is
//! working. A reading is *confirmed* once the streak reaches the configured
//! persistence count — and stays confirmed for every further reading while
//! the streak continues.
//!
//! The counter map is process-local; resetting on restart is intentional
//! (input is replayable).

use std::collections::HashMap;

use tracing::debug;

use crate::config::Settings;
use crate::types::{ConfirmedAnomaly, ScoredReading};

pub struct PersistenceGate {
    persistence_count: u32,
    counts: HashMap<String, u32>,
}

impl PersistenceGate {
    pub fn new(settings: &Settings) -> Self {
        Self {
            persistence_count: settings.persistence_count,
            counts: HashMap::new(),
        }
    }

    /// Apply one scored reading, in event order for its sensor.
    ///
    /// Returns the confirmed anomaly when the streak has reached the gate
    /// threshold, `None` otherwise.
    pub fn observe(&mut self, scored: &ScoredReading) -> Option<ConfirmedAnomaly> {
        let count = self.counts.entry(scored.sensor_id.clone()).or_insert(0);

        if scored.is_anomaly {
            *count += 1;
        } else {
            if *count > 0 {
                debug!(
                    sensor_id = %scored.sensor_id,
                    "consecutive counter reset from {} → 0",
                    *count
                );
            }
            *count = 0;
            return None;
        }

        if *count >= self.persistence_count {
            Some(ConfirmedAnomaly {
                sensor_id: scored.sensor_id.clone(),
                timestamp: scored.timestamp.clone(),
                consecutive_count: *count,
                z_score: scored.z_score,
                value: scored.value,
            })
        } else {
            None
        }
    }

    /// Current streak for a sensor (0 when unseen).
    pub fn count(&self, sensor_id: &str) -> u32 {
        self.counts.get(sensor_id).copied().unwrap_or(0)
    }
}
