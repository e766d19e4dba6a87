//! CETP inlet tripwire: stateless COD shock detection.
//!
//! Emits a shock event the moment inlet COD reaches the configured
//! threshold. Breach magnitude is measured against the empirical baseline;
//! readings at or above twice the baseline escalate to HIGH.

use crate::config::Settings;
use crate::types::ShockEvent;

pub struct Tripwire {
    cod_baseline: f64,
    cod_threshold: f64,
}

impl Tripwire {
    pub fn new(settings: &Settings) -> Self {
        Self {
            cod_baseline: settings.cod_baseline,
            cod_threshold: settings.cod_threshold,
        }
    }

    /// Check one inlet COD reading. Returns the shock event when
    /// `cod >= threshold`, preserving CETP event order.
    pub fn check(&self, time: &str, cod: f64) -> Option<ShockEvent> {
        if cod < self.cod_threshold {
            return None;
        }
        Some(ShockEvent {
            time: time.to_string(),
            cod_value: cod,
            breach_mag: cod - self.cod_baseline,
            alert_level: if cod >= self.cod_baseline * 2.0 {
                "HIGH".to_string()
            } else {
                "MEDIUM".to_string()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tripwire() -> Tripwire {
        Tripwire {
            cod_baseline: 193.0,
            cod_threshold: 250.0,
        }
    }

    #[test]
    fn below_threshold_stays_silent() {
        let tw = tripwire();
        for cod in [180.0, 190.0, 185.0, 249.99] {
            assert!(tw.check("2026-02-01 12:00", cod).is_none(), "{cod} fired");
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        let tw = tripwire();
        let event = tw.check("2026-02-01 12:00", 250.0).unwrap();
        assert_eq!(event.cod_value, 250.0);
        assert_eq!(event.breach_mag, 250.0 - 193.0);
    }

    #[test]
    fn double_baseline_escalates_to_high() {
        let tw = tripwire();
        assert_eq!(tw.check("t", 385.9).unwrap().alert_level, "MEDIUM");
        assert_eq!(tw.check("t", 386.0).unwrap().alert_level, "HIGH");
        assert_eq!(tw.check("t", 500.0).unwrap().alert_level, "HIGH");
    }

    #[test]
    fn breach_magnitude_uses_baseline_not_threshold() {
        // Threshold below baseline is a config warning, but magnitude math
        // must stay anchored on the baseline.
        let tw = Tripwire {
            cod_baseline: 193.0,
            cod_threshold: 207.0,
        };
        let event = tw.check("2026-02-01 12:23", 207.0).unwrap();
        assert_eq!(event.breach_mag, 14.0);
        assert_eq!(event.alert_level, "MEDIUM");
    }
}
