//! System-wide default constants.
//!
//! Centralises the pipeline's tunable defaults. Every value here can be
//! overridden by the matching `RIVERGUARD_*` environment variable; see
//! [`Settings::from_env`](super::Settings::from_env). Grouped by subsystem.

// ============================================================================
// Windowed Statistics
// ============================================================================

/// Sliding window length (ms).
pub const WINDOW_DURATION_MS: i64 = 30_000;

/// Hop between window starts (ms). Must be strictly less than the duration.
pub const WINDOW_HOP_MS: i64 = 5_000;

/// Standard-deviation floor; prevents division by zero in z-scoring.
pub const EPSILON: f64 = 1e-9;

// ============================================================================
// Anomaly Scoring
// ============================================================================

/// |z| must strictly exceed this to flag a reading anomalous.
pub const ZSCORE_THRESHOLD: f64 = 3.0;

/// Consecutive anomalous readings required to confirm a sensor anomaly.
pub const PERSISTENCE_COUNT: u32 = 3;

/// Sync-bucket width for aligning same-event readings across a group (ms).
pub const SYNC_TOLERANCE_MS: i64 = 60_000;

/// Group RMS composite score above which a group anomaly is declared.
pub const GROUP_THRESHOLD: f64 = 2.5;

/// Maximum accepted sensor_id length.
pub const MAX_SENSOR_ID_LENGTH: usize = 64;

// ============================================================================
// CETP Tripwire & Backtrack
// ============================================================================

/// Empirical mean CETP inlet COD (mg/L).
pub const COD_BASELINE: f64 = 193.0;

/// CETP inlet COD at or above which a shock event fires (mg/L).
pub const COD_THRESHOLD: f64 = 250.0;

/// Fixed pipe travel delay between a factory outfall and the CETP inlet.
///
/// Single source of truth for the temporal offset — shared by the backtrack
/// join and the blackout tamper detector. A dynamic, pipe-length-aware
/// replacement requires GIS network data.
pub const PIPE_TRAVEL_MINUTES: i64 = 15;

/// Half-width of the backtrack search window (seconds).
pub const ASOF_TOLERANCE_SECONDS: i64 = 120;

// ============================================================================
// ERI & Alert Routing
// ============================================================================

/// Sensitivity applied to discharge points absent from the river table.
pub const DEFAULT_SENSITIVITY: f64 = 1.5;

/// Global ERI scaler.
pub const SEVERITY_MULTIPLIER: f64 = 10.0;

/// ERI upper bound (exclusive) for the LOW band.
pub const ERI_THRESHOLD_LOW: f64 = 25.0;

/// ERI upper bound (exclusive) for the MEDIUM band.
pub const ERI_THRESHOLD_MEDIUM: f64 = 50.0;

/// ERI upper bound (exclusive) for the HIGH band; above is CRITICAL.
pub const ERI_THRESHOLD_HIGH: f64 = 100.0;

/// Minimum seconds between alerts for the same discharge point. 0 disables.
pub const ALERT_COOLDOWN_SECONDS: i64 = 300;

// ============================================================================
// Anti-Cheat
// ============================================================================

/// Tumbling window for the zero-variance detector (minutes).
pub const ZERO_VARIANCE_MINUTES: i64 = 5;

/// |max − min| below this declares a window zero-variance.
pub const ZERO_VARIANCE_EPS: f64 = 1e-4;

/// Tumbling window for the dilution fingerprint detector (minutes).
pub const FINGERPRINT_WINDOW_MINUTES: i64 = 60;

/// Mean COD must drop by at least this fraction versus the preceding window.
pub const COD_DROP_FRACTION: f64 = 0.8;

/// Mean TSS must stay within this fraction of the preceding window.
pub const TSS_STABLE_FRACTION: f64 = 0.2;

/// Tumbling window for the blackout detector (minutes); also the minimum
/// row count a window needs before the null ratio is evaluated.
pub const BLACKOUT_MIN_MINUTES: i64 = 30;

/// Fraction of null-COD rows at or above which a blackout is flagged.
pub const BLACKOUT_RATIO_THRESHOLD: f64 = 0.80;

// ============================================================================
// Metrics
// ============================================================================

/// Rolling latency window capacity (samples).
pub const LATENCY_WINDOW_SIZE: usize = 1_000;

/// Minimum seconds between latency summary log lines.
pub const METRICS_INTERVAL_SECONDS: u64 = 30;

/// Window for the alerts-per-minute rate (seconds).
pub const RATE_WINDOW_SECONDS: f64 = 60.0;

/// Event-time window for the rolling average ERI KPI (minutes).
pub const AVG_ERI_WINDOW_MINUTES: i64 = 5;

// ============================================================================
// I/O
// ============================================================================

/// strptime-style format for the `time` column of all input CSVs.
pub const INPUT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub const CETP_DATA_DIR: &str = "data/cetp";
pub const FACTORY_DATA_DIR: &str = "data/factory";
pub const EVIDENCE_LOG_PATH: &str = "data/alerts/evidence_log.jsonl";
pub const ALERT_LOG_PATH: &str = "data/alerts/alerts_log.jsonl";
pub const TAMPER_LOG_PATH: &str = "data/alerts/tamper_log.jsonl";
pub const QUARANTINE_LOG_PATH: &str = "data/alerts/quarantine_log.jsonl";
pub const METRICS_OUTPUT_PATH: &str = "data/metrics/pipeline_metrics.json";
