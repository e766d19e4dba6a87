//! Config validation: bounded-value checks on the parsed [`Settings`].
//!
//! Errors are impossible or contradictory values that must prevent startup
//! (exit code 1); warnings are suspicious but workable values that are
//! logged and ignored.

use super::Settings;
use crate::types::RiskBand;

/// A non-fatal config warning (suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Validate a parsed `Settings` instance.
///
/// Returns (errors, warnings) — errors abort startup, warnings are logged.
pub fn validate(settings: &Settings) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Window geometry: hop must subdivide an open duration
    if settings.window_hop_ms <= 0 {
        errors.push(format!(
            "window_hop_ms = {} must be > 0",
            settings.window_hop_ms
        ));
    }
    if settings.window_duration_ms <= settings.window_hop_ms {
        errors.push(format!(
            "window_duration_ms = {} must exceed window_hop_ms = {}",
            settings.window_duration_ms, settings.window_hop_ms
        ));
    }
    if settings.window_hop_ms > 0
        && settings.window_duration_ms > settings.window_hop_ms
        && settings.window_duration_ms % settings.window_hop_ms != 0
    {
        warnings.push(ValidationWarning {
            field: "window_duration_ms".to_string(),
            message: format!(
                "window_duration_ms = {} is not a multiple of window_hop_ms = {}; \
                 window boundaries will drift against the hop grid",
                settings.window_duration_ms, settings.window_hop_ms
            ),
        });
    }

    if settings.epsilon <= 0.0 {
        errors.push(format!("epsilon = {} must be > 0", settings.epsilon));
    }
    if settings.zscore_threshold <= 0.0 {
        errors.push(format!(
            "zscore_threshold = {} must be > 0",
            settings.zscore_threshold
        ));
    }
    if settings.persistence_count == 0 {
        errors.push("persistence_count must be >= 1".to_string());
    }

    // Sensor groups: non-empty, members non-empty, bitmask-representable
    if settings.sensor_groups.is_empty() {
        errors.push("sensor_groups must not be empty".to_string());
    }
    for group in &settings.sensor_groups {
        if group.name.trim().is_empty() {
            errors.push("sensor group with empty name".to_string());
        }
        if group.members.is_empty() {
            errors.push(format!("sensor group '{}' has no members", group.name));
        }
        if group.members.len() > 64 {
            errors.push(format!(
                "sensor group '{}' has {} members (max 64)",
                group.name,
                group.members.len()
            ));
        }
    }

    if settings.group_threshold <= 0.0 {
        errors.push(format!(
            "group_threshold = {} must be > 0",
            settings.group_threshold
        ));
    }
    if settings.sync_tolerance_ms < 1 {
        errors.push(format!(
            "sync_tolerance_ms = {} must be >= 1",
            settings.sync_tolerance_ms
        ));
    }

    // Value ranges: the "*" catch-all must exist and bounds must be ordered
    if !settings.sensor_value_range.iter().any(|r| r.pattern == "*") {
        errors.push("sensor_value_range must contain the \"*\" catch-all pattern".to_string());
    }
    for range in &settings.sensor_value_range {
        if range.min > range.max {
            errors.push(format!(
                "sensor_value_range pattern '{}' has min {} > max {}",
                range.pattern, range.min, range.max
            ));
        }
    }

    if settings.max_sensor_id_length == 0 {
        errors.push("max_sensor_id_length must be >= 1".to_string());
    }

    // ERI thresholds: strictly ascending
    if !(settings.eri_threshold_low < settings.eri_threshold_medium
        && settings.eri_threshold_medium < settings.eri_threshold_high)
    {
        errors.push(format!(
            "ERI thresholds must be strictly ascending (got {} / {} / {})",
            settings.eri_threshold_low, settings.eri_threshold_medium, settings.eri_threshold_high
        ));
    }

    // River sensitivity: factors within the physical scale
    for (point, factor) in &settings.river_sensitivity {
        if !(1.0..=5.0).contains(factor) {
            errors.push(format!(
                "river_sensitivity['{point}'] = {factor} is outside [1.0, 5.0]"
            ));
        }
    }
    if settings.default_sensitivity < 1.0 {
        errors.push(format!(
            "default_sensitivity = {} must be >= 1.0",
            settings.default_sensitivity
        ));
    }
    if settings.severity_multiplier <= 0.0 {
        errors.push(format!(
            "severity_multiplier = {} must be > 0",
            settings.severity_multiplier
        ));
    }

    if settings.alert_cooldown_seconds < 0 {
        errors.push(format!(
            "alert_cooldown_seconds = {} cannot be negative",
            settings.alert_cooldown_seconds
        ));
    } else if settings.alert_cooldown_seconds == 0 {
        warnings.push(ValidationWarning {
            field: "alert_cooldown_seconds".to_string(),
            message: "alert_cooldown_seconds = 0 disables alert suppression".to_string(),
        });
    }
    if settings.alert_min_risk_band == RiskBand::Low {
        warnings.push(ValidationWarning {
            field: "alert_min_risk_band".to_string(),
            message: "alert_min_risk_band = LOW routes every scored group row".to_string(),
        });
    }

    // Tripwire / backtrack
    if settings.cod_baseline <= 0.0 {
        errors.push(format!(
            "cod_baseline = {} must be > 0",
            settings.cod_baseline
        ));
    }
    if settings.cod_threshold <= 0.0 {
        errors.push(format!(
            "cod_threshold = {} must be > 0",
            settings.cod_threshold
        ));
    }
    if settings.cod_threshold < settings.cod_baseline {
        warnings.push(ValidationWarning {
            field: "cod_threshold".to_string(),
            message: format!(
                "cod_threshold = {} is below cod_baseline = {}; breach magnitudes \
                 will be negative for readings between them",
                settings.cod_threshold, settings.cod_baseline
            ),
        });
    }
    if settings.pipe_travel_minutes < 0 {
        errors.push(format!(
            "pipe_travel_minutes = {} cannot be negative",
            settings.pipe_travel_minutes
        ));
    }
    if settings.asof_tolerance_seconds < 0 {
        errors.push(format!(
            "asof_tolerance_seconds = {} cannot be negative",
            settings.asof_tolerance_seconds
        ));
    }

    // Anti-cheat
    if settings.zero_variance_minutes < 1 {
        errors.push(format!(
            "zero_variance_minutes = {} must be >= 1",
            settings.zero_variance_minutes
        ));
    }
    if settings.cod_drop_fraction <= 0.0 || settings.cod_drop_fraction >= 1.0 {
        errors.push(format!(
            "cod_drop_fraction = {} must be in (0, 1)",
            settings.cod_drop_fraction
        ));
    }
    if settings.tss_stable_fraction <= 0.0 || settings.tss_stable_fraction >= 1.0 {
        errors.push(format!(
            "tss_stable_fraction = {} must be in (0, 1)",
            settings.tss_stable_fraction
        ));
    }
    if settings.blackout_min_minutes < 1 {
        errors.push(format!(
            "blackout_min_minutes = {} must be >= 1",
            settings.blackout_min_minutes
        ));
    }

    if settings.metrics_interval_seconds == 0 {
        errors.push("metrics_interval_seconds must be > 0".to_string());
    }
    if settings.input_time_format.trim().is_empty() {
        errors.push("input_time_format must not be empty".to_string());
    }

    (errors, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_clean() {
        let settings = Settings::default();
        let (errors, warnings) = validate(&settings);
        assert!(errors.is_empty(), "default config has errors: {errors:?}");
        assert!(
            warnings.is_empty(),
            "default config has warnings: {warnings:?}"
        );
    }

    #[test]
    fn hop_must_be_smaller_than_duration() {
        let mut settings = Settings::default();
        settings.window_hop_ms = settings.window_duration_ms;
        let (errors, _) = validate(&settings);
        assert!(errors.iter().any(|e| e.contains("window_duration_ms")));
    }

    #[test]
    fn zero_hop_is_an_error() {
        let mut settings = Settings::default();
        settings.window_hop_ms = 0;
        let (errors, _) = validate(&settings);
        assert!(errors.iter().any(|e| e.contains("window_hop_ms")));
    }

    #[test]
    fn empty_groups_rejected() {
        let mut settings = Settings::default();
        settings.sensor_groups.clear();
        let (errors, _) = validate(&settings);
        assert!(errors.iter().any(|e| e.contains("sensor_groups")));
    }

    #[test]
    fn group_with_no_members_rejected() {
        let mut settings = Settings::default();
        settings.sensor_groups[0].members.clear();
        let (errors, _) = validate(&settings);
        assert!(errors.iter().any(|e| e.contains("no members")));
    }

    #[test]
    fn missing_catch_all_rejected() {
        let mut settings = Settings::default();
        settings.sensor_value_range.retain(|r| r.pattern != "*");
        let (errors, _) = validate(&settings);
        assert!(errors.iter().any(|e| e.contains("catch-all")));
    }

    #[test]
    fn eri_thresholds_must_ascend() {
        let mut settings = Settings::default();
        settings.eri_threshold_medium = settings.eri_threshold_low;
        let (errors, _) = validate(&settings);
        assert!(errors.iter().any(|e| e.contains("strictly ascending")));
    }

    #[test]
    fn sensitivity_outside_scale_rejected() {
        let mut settings = Settings::default();
        settings
            .river_sensitivity
            .insert("FACTORY_X".to_string(), 7.5);
        let (errors, _) = validate(&settings);
        assert!(errors.iter().any(|e| e.contains("FACTORY_X")));
    }

    #[test]
    fn zero_cooldown_warns_not_errors() {
        let mut settings = Settings::default();
        settings.alert_cooldown_seconds = 0;
        let (errors, warnings) = validate(&settings);
        assert!(errors.is_empty());
        assert!(warnings.iter().any(|w| w.field == "alert_cooldown_seconds"));
    }

    #[test]
    fn bad_drop_fraction_rejected() {
        let mut settings = Settings::default();
        settings.cod_drop_fraction = 1.5;
        let (errors, _) = validate(&settings);
        assert!(errors.iter().any(|e| e.contains("cod_drop_fraction")));
    }
}
