//! Per-sensor sliding-window statistics.
//!
//! Each sensor maintains a table of open windows keyed by hop-aligned start
//! time. A reading at time T belongs to every window `[s, s + duration)`
//! covering it — at most `ceil(duration / hop)` windows — and contributes
//! O(1) work to each: running sum, running sum of squares, min/max
//! candidates, and count. No window is ever re-scanned.
//!
//! Standard deviation is derived from the two running aggregates via the
//! identity `Var(X) = E[X²] − E[X]²`, clamped at zero (floating-point
//! rounding can go slightly negative on near-constant input) and floored at
//! ε so downstream z-scoring never divides by zero.
//!
//! A window is emitted when the sensor's event time passes its end, and on
//! `flush()` when the source closes. Windows with a single sample still
//! emit (std = ε). Null readings never reach this stage, so all-null
//! windows cannot form.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::config::Settings;
use crate::types::{parse_event_time, Reading, WindowStats};

/// Running aggregates for one open (sensor, window) pair.
#[derive(Debug, Clone)]
struct WindowAccum {
    sum: f64,
    sum_sq: f64,
    min: f64,
    max: f64,
    count: u64,
}

impl WindowAccum {
    fn new() -> Self {
        Self {
            sum: 0.0,
            sum_sq: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            count: 0,
        }
    }

    fn add(&mut self, value: f64) {
        self.sum += value;
        self.sum_sq += value * value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.count += 1;
    }
}

/// Per-sensor window state: open accumulators plus the last emitted stats
/// row, which the z-scorer joins against.
#[derive(Debug, Default)]
struct SensorWindows {
    /// Open windows keyed by start time (ms) — BTreeMap keeps emission order.
    open: BTreeMap<i64, WindowAccum>,
    latest: Option<WindowStats>,
}

/// Incremental sliding-window statistics over all sensors.
pub struct WindowedStats {
    duration_ms: i64,
    hop_ms: i64,
    epsilon: f64,
    time_format: String,
    sensors: HashMap<String, SensorWindows>,
}

impl WindowedStats {
    pub fn new(settings: &Settings) -> Self {
        Self {
            duration_ms: settings.window_duration_ms,
            hop_ms: settings.window_hop_ms,
            epsilon: settings.epsilon,
            time_format: settings.input_time_format.clone(),
            sensors: HashMap::new(),
        }
    }

    /// Feed one reading; returns the windows its arrival closed, in
    /// ascending start order. The sensor's "latest" stats advance to the
    /// newest closed window.
    pub fn observe(&mut self, reading: &Reading) -> Vec<WindowStats> {
        let Some(value) = reading.value else {
            return Vec::new();
        };
        let Some(ts) = parse_event_time(&reading.timestamp, &self.time_format) else {
            debug!(
                sensor_id = %reading.sensor_id,
                timestamp = %reading.timestamp,
                "unparseable timestamp reached windowed stats — skipping"
            );
            return Vec::new();
        };
        let ts_ms = ts.and_utc().timestamp_millis();

        let sensor = self
            .sensors
            .entry(reading.sensor_id.clone())
            .or_default();

        // Close every window the event time has passed.
        let mut emitted = Vec::new();
        let closed: Vec<i64> = sensor
            .open
            .range(..=(ts_ms - self.duration_ms))
            .map(|(&start, _)| start)
            .collect();
        for start in closed {
            if let Some(accum) = sensor.open.remove(&start) {
                let stats = finalize_window(
                    &reading.sensor_id,
                    start,
                    &accum,
                    self.duration_ms,
                    self.epsilon,
                    &self.time_format,
                );
                sensor.latest = Some(stats.clone());
                emitted.push(stats);
            }
        }

        // Add the reading to every window covering its timestamp.
        let mut start = ts_ms.div_euclid(self.hop_ms) * self.hop_ms;
        while start > ts_ms - self.duration_ms {
            sensor.open.entry(start).or_insert_with(WindowAccum::new).add(value);
            start -= self.hop_ms;
        }

        emitted
    }

    /// Most recent emitted stats row for a sensor, if any window has closed.
    pub fn latest_stats(&self, sensor_id: &str) -> Option<&WindowStats> {
        self.sensors.get(sensor_id)?.latest.as_ref()
    }

    /// Emit every still-open window — called when the source closes.
    ///
    /// Rows are ordered by (sensor_id, window_start) for determinism.
    pub fn flush(&mut self) -> Vec<WindowStats> {
        let mut sensor_ids: Vec<String> = self.sensors.keys().cloned().collect();
        sensor_ids.sort();

        let mut emitted = Vec::new();
        for sensor_id in sensor_ids {
            let Some(sensor) = self.sensors.get_mut(&sensor_id) else {
                continue;
            };
            let open = std::mem::take(&mut sensor.open);
            for (start, accum) in open {
                let stats = finalize_window(
                    &sensor_id,
                    start,
                    &accum,
                    self.duration_ms,
                    self.epsilon,
                    &self.time_format,
                );
                sensor.latest = Some(stats.clone());
                emitted.push(stats);
            }
        }
        emitted
    }

}

/// Population std from E[X] and E[X²]: sqrt(max(0, E[X²] − E[X]²)) + ε.
fn population_std(mean: f64, mean_sq: f64, epsilon: f64) -> f64 {
    let variance = mean_sq - mean * mean;
    variance.max(0.0).sqrt() + epsilon
}

fn format_bound(ms: i64, format: &str) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.naive_utc().format(format).to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn finalize_window(
    sensor_id: &str,
    start_ms: i64,
    accum: &WindowAccum,
    duration_ms: i64,
    epsilon: f64,
    time_format: &str,
) -> WindowStats {
    #[allow(clippy::cast_precision_loss)]
    let n = accum.count as f64;
    let mean = accum.sum / n;
    let mean_sq = accum.sum_sq / n;
    WindowStats {
        sensor_id: sensor_id.to_string(),
        window_start: format_bound(start_ms, time_format),
        window_end: format_bound(start_ms + duration_ms, time_format),
        mean,
        std: population_std(mean, mean_sq, epsilon),
        min: accum.min,
        max: accum.max,
        sample_count: accum.count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    /// 60 s windows hopping every 20 s, on minute-resolution test data.
    fn test_settings() -> Settings {
        Settings {
            window_duration_ms: 60_000,
            window_hop_ms: 20_000,
            epsilon: 1e-9,
            ..Settings::default()
        }
    }

    fn feed(stats: &mut WindowedStats, sensor: &str, time: &str, value: f64) -> Vec<WindowStats> {
        stats.observe(&Reading::new(sensor, time, value))
    }

    #[test]
    fn no_emission_until_window_passes() {
        let settings = test_settings();
        let mut stats = WindowedStats::new(&settings);
        assert!(feed(&mut stats, "s1", "2026-02-01 12:00", 10.0).is_empty());
        assert!(stats.latest_stats("s1").is_none());
    }

    #[test]
    fn window_emits_when_event_time_passes_end() {
        let settings = test_settings();
        let mut stats = WindowedStats::new(&settings);
        feed(&mut stats, "s1", "2026-02-01 12:00", 10.0);
        // Two minutes later: every window containing 12:00 has closed.
        let emitted = feed(&mut stats, "s1", "2026-02-01 12:02", 20.0);
        assert!(!emitted.is_empty());
        for w in &emitted {
            assert_eq!(w.sample_count, 1);
            assert_eq!(w.mean, 10.0);
            assert!((w.std - settings.epsilon).abs() < 1e-15);
        }
        assert!(stats.latest_stats("s1").is_some());
    }

    #[test]
    fn invariants_hold_on_flush() {
        let settings = test_settings();
        let mut stats = WindowedStats::new(&settings);
        for (i, v) in [180.0, 190.0, 185.0, 400.0].iter().enumerate() {
            feed(
                &mut stats,
                "s1",
                &format!("2026-02-01 12:0{i}"),
                *v,
            );
        }
        let emitted = stats.flush();
        assert!(!emitted.is_empty());
        for w in &emitted {
            assert!(w.min <= w.mean && w.mean <= w.max, "min<=mean<=max: {w:?}");
            assert!(w.std >= settings.epsilon, "std floored: {w:?}");
            assert!(w.sample_count >= 1);
        }
    }

    #[test]
    fn constant_input_yields_epsilon_std() {
        let settings = test_settings();
        let mut stats = WindowedStats::new(&settings);
        for i in 0..3 {
            feed(&mut stats, "s1", &format!("2026-02-01 12:0{i}"), 115.0);
        }
        for w in stats.flush() {
            assert_eq!(w.mean, 115.0);
            assert_eq!(w.min, 115.0);
            assert_eq!(w.max, 115.0);
            assert!((w.std - settings.epsilon).abs() < 1e-15, "std = ε exactly");
        }
    }

    #[test]
    fn reading_lands_in_every_overlapping_window() {
        let settings = test_settings();
        let mut stats = WindowedStats::new(&settings);
        // duration/hop = 3 overlapping windows per reading
        feed(&mut stats, "s1", "2026-02-01 12:01", 42.0);
        let emitted = stats.flush();
        assert_eq!(emitted.len(), 3);
        let starts: Vec<&str> = emitted.iter().map(|w| w.window_start.as_str()).collect();
        assert_eq!(
            starts,
            vec!["2026-02-01 12:00", "2026-02-01 12:00", "2026-02-01 12:01"],
            "hop-aligned starts at 12:00:20 granularity collapse to minute formatting"
        );
    }

    #[test]
    fn sensors_are_independent() {
        let settings = test_settings();
        let mut stats = WindowedStats::new(&settings);
        feed(&mut stats, "a", "2026-02-01 12:00", 1.0);
        feed(&mut stats, "b", "2026-02-01 12:00", 100.0);
        let emitted_a = feed(&mut stats, "a", "2026-02-01 12:05", 2.0);
        assert!(emitted_a.iter().all(|w| w.sensor_id == "a"));
        assert!(stats.latest_stats("b").is_none());
    }

    #[test]
    fn variance_identity_matches_direct_computation() {
        // 3-minute windows so the three minute-spaced samples share one.
        let settings = Settings {
            window_duration_ms: 180_000,
            window_hop_ms: 60_000,
            epsilon: 1e-9,
            ..Settings::default()
        };
        let mut stats = WindowedStats::new(&settings);
        let values = [3.0_f64, 7.0, 11.0];
        for (i, v) in values.iter().enumerate() {
            feed(&mut stats, "s1", &format!("2026-02-01 12:0{i}"), *v);
        }
        let emitted = stats.flush();
        // The last hop window holds only the final value; find one with all 3.
        let full = emitted
            .iter()
            .find(|w| w.sample_count == 3)
            .expect("a window containing all samples");
        let mean: f64 = values.iter().sum::<f64>() / 3.0;
        let var: f64 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 3.0;
        assert!((full.mean - mean).abs() < 1e-12);
        assert!((full.std - (var.sqrt() + settings.epsilon)).abs() < 1e-9);
    }
}
