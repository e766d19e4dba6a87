//! Typed pipeline settings loaded once from environment variables.
//!
//! Every tunable has a `RIVERGUARD_*` variable and a default from
//! [`defaults`]. Parsing is strict: a malformed value is a fatal
//! [`ConfigError`], not a silent fallback. Range validation happens
//! separately in [`validation`](super::validation) so all violations can be
//! reported together at startup.

use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;

use thiserror::Error;

use super::defaults;
use crate::types::RiskBand;

/// Fatal configuration error — raised before any processing starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("config validation failed:\n{0}")]
    Validation(String),
}

/// One named sensor group: a discharge point and its ordered member sensors.
///
/// Member order is load-bearing — it defines the bitmask bit assignment in
/// the multivariate aggregator and the contributing/missing listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorGroup {
    pub name: String,
    pub members: Vec<String>,
}

/// One ordered value-range rule: first glob pattern matching a sensor_id wins.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRange {
    pub pattern: String,
    pub min: f64,
    pub max: f64,
}

/// Complete pipeline configuration. Immutable after startup.
#[derive(Debug, Clone)]
pub struct Settings {
    // Windowed statistics
    pub window_duration_ms: i64,
    pub window_hop_ms: i64,
    pub epsilon: f64,

    // Anomaly scoring
    pub zscore_threshold: f64,
    pub persistence_count: u32,
    pub sync_tolerance_ms: i64,
    pub group_threshold: f64,
    pub sensor_groups: Vec<SensorGroup>,
    pub sensor_value_range: Vec<ValueRange>,
    pub max_sensor_id_length: usize,

    // CETP tripwire & backtrack
    pub cod_baseline: f64,
    pub cod_threshold: f64,
    pub pipe_travel_minutes: i64,
    pub asof_tolerance_seconds: i64,

    // ERI & alert routing
    pub river_sensitivity: BTreeMap<String, f64>,
    pub default_sensitivity: f64,
    pub severity_multiplier: f64,
    pub eri_threshold_low: f64,
    pub eri_threshold_medium: f64,
    pub eri_threshold_high: f64,
    pub alert_min_risk_band: RiskBand,
    pub alert_cooldown_seconds: i64,

    // Anti-cheat
    pub zero_variance_minutes: i64,
    pub cod_drop_fraction: f64,
    pub tss_stable_fraction: f64,
    pub blackout_min_minutes: i64,

    // Metrics
    pub metrics_interval_seconds: u64,

    // I/O
    pub input_time_format: String,
    pub evidence_log_path: String,
    pub alert_log_path: String,
    pub tamper_log_path: String,
    pub quarantine_log_path: String,
    pub metrics_output_path: String,
    pub webhook_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_duration_ms: defaults::WINDOW_DURATION_MS,
            window_hop_ms: defaults::WINDOW_HOP_MS,
            epsilon: defaults::EPSILON,
            zscore_threshold: defaults::ZSCORE_THRESHOLD,
            persistence_count: defaults::PERSISTENCE_COUNT,
            sync_tolerance_ms: defaults::SYNC_TOLERANCE_MS,
            group_threshold: defaults::GROUP_THRESHOLD,
            sensor_groups: default_sensor_groups(),
            sensor_value_range: default_value_ranges(),
            max_sensor_id_length: defaults::MAX_SENSOR_ID_LENGTH,
            cod_baseline: defaults::COD_BASELINE,
            cod_threshold: defaults::COD_THRESHOLD,
            pipe_travel_minutes: defaults::PIPE_TRAVEL_MINUTES,
            asof_tolerance_seconds: defaults::ASOF_TOLERANCE_SECONDS,
            river_sensitivity: default_river_sensitivity(),
            default_sensitivity: defaults::DEFAULT_SENSITIVITY,
            severity_multiplier: defaults::SEVERITY_MULTIPLIER,
            eri_threshold_low: defaults::ERI_THRESHOLD_LOW,
            eri_threshold_medium: defaults::ERI_THRESHOLD_MEDIUM,
            eri_threshold_high: defaults::ERI_THRESHOLD_HIGH,
            alert_min_risk_band: RiskBand::Medium,
            alert_cooldown_seconds: defaults::ALERT_COOLDOWN_SECONDS,
            zero_variance_minutes: defaults::ZERO_VARIANCE_MINUTES,
            cod_drop_fraction: defaults::COD_DROP_FRACTION,
            tss_stable_fraction: defaults::TSS_STABLE_FRACTION,
            blackout_min_minutes: defaults::BLACKOUT_MIN_MINUTES,
            metrics_interval_seconds: defaults::METRICS_INTERVAL_SECONDS,
            input_time_format: defaults::INPUT_TIME_FORMAT.to_string(),
            evidence_log_path: defaults::EVIDENCE_LOG_PATH.to_string(),
            alert_log_path: defaults::ALERT_LOG_PATH.to_string(),
            tamper_log_path: defaults::TAMPER_LOG_PATH.to_string(),
            quarantine_log_path: defaults::QUARANTINE_LOG_PATH.to_string(),
            metrics_output_path: defaults::METRICS_OUTPUT_PATH.to_string(),
            webhook_url: None,
        }
    }
}

impl Settings {
    /// Load settings from the environment, falling back to defaults.
    ///
    /// Parse failures are fatal; range violations are collected later by
    /// [`validation::validate`](super::validation::validate).
    pub fn from_env() -> Result<Self, ConfigError> {
        let base = Self::default();
        Ok(Self {
            window_duration_ms: env_parse("RIVERGUARD_WINDOW_DURATION_MS", base.window_duration_ms)?,
            window_hop_ms: env_parse("RIVERGUARD_WINDOW_HOP_MS", base.window_hop_ms)?,
            epsilon: env_parse("RIVERGUARD_EPSILON", base.epsilon)?,
            zscore_threshold: env_parse("RIVERGUARD_ZSCORE_THRESHOLD", base.zscore_threshold)?,
            persistence_count: env_parse("RIVERGUARD_PERSISTENCE_COUNT", base.persistence_count)?,
            sync_tolerance_ms: env_parse("RIVERGUARD_SYNC_TOLERANCE_MS", base.sync_tolerance_ms)?,
            group_threshold: env_parse("RIVERGUARD_GROUP_THRESHOLD", base.group_threshold)?,
            sensor_groups: env_map("RIVERGUARD_SENSOR_GROUPS", parse_sensor_groups)?
                .unwrap_or(base.sensor_groups),
            sensor_value_range: env_map("RIVERGUARD_SENSOR_VALUE_RANGE", parse_value_ranges)?
                .unwrap_or(base.sensor_value_range),
            max_sensor_id_length: env_parse(
                "RIVERGUARD_MAX_SENSOR_ID_LENGTH",
                base.max_sensor_id_length,
            )?,
            cod_baseline: env_parse("RIVERGUARD_COD_BASELINE", base.cod_baseline)?,
            cod_threshold: env_parse("RIVERGUARD_COD_THRESHOLD", base.cod_threshold)?,
            pipe_travel_minutes: env_parse(
                "RIVERGUARD_PIPE_TRAVEL_MINUTES",
                base.pipe_travel_minutes,
            )?,
            asof_tolerance_seconds: env_parse(
                "RIVERGUARD_ASOF_TOLERANCE_SECONDS",
                base.asof_tolerance_seconds,
            )?,
            river_sensitivity: env_map("RIVERGUARD_RIVER_SENSITIVITY", parse_sensitivity_table)?
                .unwrap_or(base.river_sensitivity),
            default_sensitivity: env_parse(
                "RIVERGUARD_DEFAULT_SENSITIVITY",
                base.default_sensitivity,
            )?,
            severity_multiplier: env_parse(
                "RIVERGUARD_SEVERITY_MULTIPLIER",
                base.severity_multiplier,
            )?,
            eri_threshold_low: env_parse("RIVERGUARD_ERI_THRESHOLD_LOW", base.eri_threshold_low)?,
            eri_threshold_medium: env_parse(
                "RIVERGUARD_ERI_THRESHOLD_MEDIUM",
                base.eri_threshold_medium,
            )?,
            eri_threshold_high: env_parse("RIVERGUARD_ERI_THRESHOLD_HIGH", base.eri_threshold_high)?,
            alert_min_risk_band: env_parse(
                "RIVERGUARD_ALERT_MIN_RISK_BAND",
                base.alert_min_risk_band,
            )?,
            alert_cooldown_seconds: env_parse(
                "RIVERGUARD_ALERT_COOLDOWN_SECONDS",
                base.alert_cooldown_seconds,
            )?,
            zero_variance_minutes: env_parse(
                "RIVERGUARD_ZERO_VARIANCE_MINUTES",
                base.zero_variance_minutes,
            )?,
            cod_drop_fraction: env_parse("RIVERGUARD_COD_DROP_FRACTION", base.cod_drop_fraction)?,
            tss_stable_fraction: env_parse(
                "RIVERGUARD_TSS_STABLE_FRACTION",
                base.tss_stable_fraction,
            )?,
            blackout_min_minutes: env_parse(
                "RIVERGUARD_BLACKOUT_MIN_MINUTES",
                base.blackout_min_minutes,
            )?,
            metrics_interval_seconds: env_parse(
                "RIVERGUARD_METRICS_INTERVAL_SECONDS",
                base.metrics_interval_seconds,
            )?,
            input_time_format: env_string("RIVERGUARD_INPUT_TIME_FORMAT", &base.input_time_format),
            evidence_log_path: env_string("RIVERGUARD_EVIDENCE_LOG_PATH", &base.evidence_log_path),
            alert_log_path: env_string("RIVERGUARD_ALERT_LOG_PATH", &base.alert_log_path),
            tamper_log_path: env_string("RIVERGUARD_TAMPER_LOG_PATH", &base.tamper_log_path),
            quarantine_log_path: env_string(
                "RIVERGUARD_QUARANTINE_LOG_PATH",
                &base.quarantine_log_path,
            ),
            metrics_output_path: env_string(
                "RIVERGUARD_METRICS_OUTPUT_PATH",
                &base.metrics_output_path,
            ),
            webhook_url: env_var("RIVERGUARD_WEBHOOK_URL"),
        })
    }

    /// Backtrack offset as a chrono duration.
    pub fn pipe_travel(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.pipe_travel_minutes)
    }

    /// Backtrack search half-width as a chrono duration.
    pub fn asof_tolerance(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.asof_tolerance_seconds)
    }
}

// ============================================================================
// Built-in tables
// ============================================================================

const FACTORY_IDS: [&str; 4] = ["FACTORY_A", "FACTORY_B", "FACTORY_C", "FACTORY_D"];
const CHANNELS: [&str; 4] = ["cod", "bod", "ph", "tss"];

/// One group per factory, members ordered cod, bod, ph, tss.
fn default_sensor_groups() -> Vec<SensorGroup> {
    FACTORY_IDS
        .iter()
        .map(|factory| SensorGroup {
            name: (*factory).to_string(),
            members: CHANNELS
                .iter()
                .map(|ch| format!("{factory}_{ch}"))
                .collect(),
        })
        .collect()
}

/// pH channels are physically bounded; everything else gets the catch-all.
fn default_value_ranges() -> Vec<ValueRange> {
    vec![
        ValueRange {
            pattern: "*_ph".to_string(),
            min: 0.0,
            max: 14.0,
        },
        ValueRange {
            pattern: "*".to_string(),
            min: -1e6,
            max: 1e6,
        },
    ]
}

fn default_river_sensitivity() -> BTreeMap<String, f64> {
    [
        ("FACTORY_A", 2.0),
        ("FACTORY_B", 3.5),
        ("FACTORY_C", 1.5),
        ("FACTORY_D", 4.0),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

// ============================================================================
// Env parsing helpers
// ============================================================================

fn env_var(name: &'static str) -> Option<String> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn env_string(name: &'static str, default: &str) -> String {
    env_var(name).unwrap_or_else(|| default.to_string())
}

fn env_parse<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: raw,
            reason: e.to_string(),
        }),
    }
}

fn env_map<T>(
    name: &'static str,
    parse: fn(&str) -> Result<T, String>,
) -> Result<Option<T>, ConfigError> {
    match env_var(name) {
        None => Ok(None),
        Some(raw) => parse(&raw)
            .map(Some)
            .map_err(|reason| ConfigError::Invalid {
                name,
                value: raw,
                reason,
            }),
    }
}

/// Parse `"GROUP:a,b,c;GROUP2:d,e"` into ordered sensor groups.
fn parse_sensor_groups(raw: &str) -> Result<Vec<SensorGroup>, String> {
    let mut groups = Vec::new();
    for entry in raw.split(';').filter(|e| !e.trim().is_empty()) {
        let (name, members) = entry
            .split_once(':')
            .ok_or_else(|| format!("expected 'name:member,...' in {entry:?}"))?;
        let members: Vec<String> = members
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(ToString::to_string)
            .collect();
        groups.push(SensorGroup {
            name: name.trim().to_string(),
            members,
        });
    }
    Ok(groups)
}

/// Parse `"pattern=lo..hi;*=lo..hi"` into an ordered range list.
fn parse_value_ranges(raw: &str) -> Result<Vec<ValueRange>, String> {
    let mut ranges = Vec::new();
    for entry in raw.split(';').filter(|e| !e.trim().is_empty()) {
        let (pattern, bounds) = entry
            .split_once('=')
            .ok_or_else(|| format!("expected 'pattern=lo..hi' in {entry:?}"))?;
        let (lo, hi) = bounds
            .split_once("..")
            .ok_or_else(|| format!("expected 'lo..hi' bounds in {entry:?}"))?;
        let min: f64 = lo
            .trim()
            .parse()
            .map_err(|_| format!("bad lower bound in {entry:?}"))?;
        let max: f64 = hi
            .trim()
            .parse()
            .map_err(|_| format!("bad upper bound in {entry:?}"))?;
        ranges.push(ValueRange {
            pattern: pattern.trim().to_string(),
            min,
            max,
        });
    }
    Ok(ranges)
}

/// Parse `"POINT=2.5;POINT2=1.5"` into a sensitivity table.
fn parse_sensitivity_table(raw: &str) -> Result<BTreeMap<String, f64>, String> {
    let mut table = BTreeMap::new();
    for entry in raw.split(';').filter(|e| !e.trim().is_empty()) {
        let (point, factor) = entry
            .split_once('=')
            .ok_or_else(|| format!("expected 'point=factor' in {entry:?}"))?;
        let factor: f64 = factor
            .trim()
            .parse()
            .map_err(|_| format!("bad factor in {entry:?}"))?;
        table.insert(point.trim().to_string(), factor);
    }
    Ok(table)
}
