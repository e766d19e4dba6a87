//! Core data model: readings, window aggregates, scored events, audit records.

mod bands;
mod reading;
mod records;

pub use bands::{AlertLevel, RiskBand};
pub use reading::{
    CetpRow, ConfirmedAnomaly, FactoryRow, QuarantineRecord, Reading, RowStatus, ScoredReading,
    WindowStats,
};
pub use records::{
    AlertRecord, AttributedAnomaly, EriReading, EvidenceRecord, GroupRow, MetricsSnapshot,
    ShockEvent, TamperDetail, TamperRecord, TamperType,
};

use chrono::NaiveDateTime;

/// Parse an event-time string in the configured input format, falling back
/// to a numeric Unix epoch (seconds, fractional allowed).
///
/// Returns `None` when neither interpretation applies — callers decide
/// whether that skips the record or passes it through (cooldown gating
/// passes unparseable timestamps, the validator rejects them).
pub fn parse_event_time(timestamp: &str, format: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(timestamp, format) {
        return Some(dt);
    }
    let epoch: f64 = timestamp.trim().parse().ok()?;
    if !epoch.is_finite() {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let epoch_ms = (epoch * 1000.0) as i64;
    chrono::DateTime::from_timestamp_millis(epoch_ms).map(|dt| dt.naive_utc())
}

/// Round to two decimal places — the precision of all audit-log floats.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Current wall-clock time as an ISO-8601 UTC string for `logged_at` stamps.
pub fn utc_now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FMT: &str = "%Y-%m-%d %H:%M";

    #[test]
    fn parses_formatted_time() {
        let dt = parse_event_time("2026-02-01 12:23", FMT).unwrap();
        assert_eq!(dt.format(FMT).to_string(), "2026-02-01 12:23");
    }

    #[test]
    fn parses_numeric_epoch() {
        let dt = parse_event_time("1770000000", FMT).unwrap();
        assert_eq!(dt.and_utc().timestamp(), 1_770_000_000);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_event_time("not-a-time", FMT).is_none());
        assert!(parse_event_time("inf", FMT).is_none());
    }

    #[test]
    fn round2_half_up() {
        assert_eq!(round2(449.996), 450.0);
        assert_eq!(round2(13.954), 13.95);
    }
}
