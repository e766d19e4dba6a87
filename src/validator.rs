//! Input validation for sensor readings entering the scored path.
//!
//! Pure per-record predicate — never panics, never throws. Rejection rules:
//!
//! 1. `sensor_id`, `timestamp`, `value` must be present.
//! 2. `sensor_id` must be non-empty after trimming and within the configured
//!    max length.
//! 3. `value` must be finite (NaN/Inf rejected).
//! 4. `timestamp` must parse as the configured format or a numeric epoch.
//! 5. `value` must lie inside the range of the first glob pattern matching
//!    `sensor_id` in the ordered `sensor_value_range` list (the `"*"`
//!    catch-all always matches something).
//!
//! Valid rows continue; rejected rows are wrapped in a [`QuarantineRecord`]
//! and written to the quarantine sink with their original payload.

use crate::config::Settings;
use crate::types::{parse_event_time, utc_now_iso, QuarantineRecord, Reading};

/// Validate a single reading against the configured rules.
///
/// Returns `Ok(())` or `Err(reason)`; the reason string lands verbatim in
/// the quarantine record.
pub fn validate_reading(reading: &Reading, settings: &Settings) -> Result<(), String> {
    // 1. Field presence
    if reading.sensor_id.is_empty() {
        return Err("missing 'sensor_id'".to_string());
    }
    if reading.timestamp.is_empty() {
        return Err("missing 'timestamp'".to_string());
    }
    let Some(value) = reading.value else {
        return Err("missing 'value'".to_string());
    };

    // 2. sensor_id shape
    if reading.sensor_id.trim().is_empty() {
        return Err("invalid 'sensor_id': blank".to_string());
    }
    if reading.sensor_id.len() > settings.max_sensor_id_length {
        return Err(format!(
            "sensor_id exceeds max length ({} > {})",
            reading.sensor_id.len(),
            settings.max_sensor_id_length
        ));
    }

    // 3. value must be finite
    if !value.is_finite() {
        return Err(format!("value must be finite (got {value})"));
    }

    // 4. timestamp must be parseable
    if parse_event_time(&reading.timestamp, &settings.input_time_format).is_none() {
        return Err(format!(
            "invalid 'timestamp' format: {:?}",
            reading.timestamp
        ));
    }

    // 5. Range enforcement: first matching pattern wins
    for range in &settings.sensor_value_range {
        if glob_match(&range.pattern, &reading.sensor_id) {
            if value < range.min || value > range.max {
                return Err(format!(
                    "value {value} out of range [{}, {}] for pattern {:?}",
                    range.min, range.max, range.pattern
                ));
            }
            break;
        }
    }

    Ok(())
}

/// Wrap a rejected reading for the quarantine log.
pub fn quarantine(reading: &Reading, reason: String) -> QuarantineRecord {
    QuarantineRecord {
        sensor_id: reading.sensor_id.clone(),
        timestamp: reading.timestamp.clone(),
        value: reading.value,
        rejection_reason: reason,
        received_at: utc_now_iso(),
    }
}

// ============================================================================
// Glob matching
// ============================================================================

/// Shell-style wildcard match: `*` matches any run, `?` any single char.
///
/// Iterative backtracking over bytes — sensor ids are ASCII by convention.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pat = pattern.as_bytes();
    let txt = text.as_bytes();
    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while t < txt.len() {
        if p < pat.len() && (pat[p] == b'?' || pat[p] == txt[t]) {
            p += 1;
            t += 1;
        } else if p < pat.len() && pat[p] == b'*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            // Backtrack: let the last '*' absorb one more character.
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while p < pat.len() && pat[p] == b'*' {
        p += 1;
    }
    p == pat.len()
}
