//! Anti-cheat engine: three tamper detectors over factory discharge history.
//!
//! All three run as batch passes over the eagerly loaded factory rows,
//! tumbling-windowed per factory:
//!
//! 1. **Zero-variance** — a COD trace that is perfectly flat across a window
//!    (|max − min| < 1e-4, ≥ 2 samples) is a frozen or copy-pasted sensor
//!    value.
//! 2. **Chemical fingerprint (dilution)** — adding clean water drops COD
//!    (dissolved organics) but suspended solids don't dissolve, so TSS
//!    stays high. Flag windows whose mean COD collapses versus the
//!    preceding window while mean TSS holds.
//! 3. **Blackout** — a window where ≥ 80% of rows report null COD is
//!    strategic sensor silence, not noise.
//!
//! The combined output is sorted by window end ascending; `logged_at` is
//!    stamped by the sink at write time.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime};
use tracing::info;

use crate::config::Settings;
use crate::config::defaults::{
    BLACKOUT_RATIO_THRESHOLD, FINGERPRINT_WINDOW_MINUTES, ZERO_VARIANCE_EPS,
};
use crate::types::{parse_event_time, FactoryRow, TamperDetail, TamperRecord, TamperType};

/// One history row with a parsed timestamp. Rows whose time column does not
/// parse never enter a detector.
struct HistRow<'a> {
    time: &'a str,
    ts: NaiveDateTime,
    cod: Option<f64>,
    tss: Option<f64>,
}

pub struct AntiCheat {
    zero_variance_minutes: i64,
    cod_drop_fraction: f64,
    tss_stable_fraction: f64,
    blackout_min_minutes: i64,
    time_format: String,
}

impl AntiCheat {
    pub fn new(settings: &Settings) -> Self {
        Self {
            zero_variance_minutes: settings.zero_variance_minutes,
            cod_drop_fraction: settings.cod_drop_fraction,
            tss_stable_fraction: settings.tss_stable_fraction,
            blackout_min_minutes: settings.blackout_min_minutes,
            time_format: settings.input_time_format.clone(),
        }
    }

    /// Run all three detectors and return the combined record list sorted
    /// by window end.
    pub fn run_all(&self, rows: &[FactoryRow]) -> Vec<TamperRecord> {
        let by_factory = self.group_by_factory(rows);

        let zv = self.detect_zero_variance(&by_factory);
        let fp = self.detect_chemical_fingerprint(&by_factory);
        let bo = self.detect_blackouts(&by_factory);

        info!(
            zero_variance = zv.len(),
            dilution = fp.len(),
            blackout = bo.len(),
            "anti-cheat detections"
        );

        let mut all: Vec<TamperRecord> = zv.into_iter().chain(fp).chain(bo).collect();
        all.sort_by(|a, b| a.window_end.cmp(&b.window_end));
        all
    }

    fn group_by_factory<'a>(&self, rows: &'a [FactoryRow]) -> BTreeMap<String, Vec<HistRow<'a>>> {
        let mut by_factory: BTreeMap<String, Vec<HistRow<'a>>> = BTreeMap::new();
        for row in rows {
            let Some(ts) = parse_event_time(&row.time, &self.time_format) else {
                continue;
            };
            by_factory.entry(row.factory_id.clone()).or_default().push(HistRow {
                time: &row.time,
                ts,
                cod: row.cod,
                tss: row.tss,
            });
        }
        for group in by_factory.values_mut() {
            group.sort_by_key(|r| r.ts);
        }
        by_factory
    }

    // ------------------------------------------------------------------
    // 1. Zero-variance alarm
    // ------------------------------------------------------------------

    fn detect_zero_variance(
        &self,
        by_factory: &BTreeMap<String, Vec<HistRow<'_>>>,
    ) -> Vec<TamperRecord> {
        let mut records = Vec::new();
        let window = Duration::minutes(self.zero_variance_minutes);

        for (factory_id, group) in by_factory {
            let clean: Vec<(&HistRow<'_>, f64)> = group
                .iter()
                .filter_map(|r| r.cod.map(|c| (r, c)))
                .collect();

            for_each_tumbling_window(clean.iter().map(|(r, _)| r.ts), window, |lo, hi| {
                let in_window: Vec<&(&HistRow<'_>, f64)> = clean
                    .iter()
                    .filter(|(r, _)| r.ts >= lo && r.ts < hi)
                    .collect();
                if in_window.len() < 2 {
                    return;
                }
                let cod_max = in_window.iter().map(|(_, c)| *c).fold(f64::NEG_INFINITY, f64::max);
                let cod_min = in_window.iter().map(|(_, c)| *c).fold(f64::INFINITY, f64::min);
                let cod_range = cod_max - cod_min;
                if cod_range < ZERO_VARIANCE_EPS {
                    records.push(TamperRecord {
                        tamper_type: TamperType::ZeroVariance,
                        factory_id: factory_id.clone(),
                        window_end: last_time(&in_window),
                        detail: TamperDetail::ZeroVariance {
                            cod_max: round_to(cod_max, 4),
                            cod_min: round_to(cod_min, 4),
                            cod_range: round_to(cod_range, 6),
                            row_count: in_window.len() as u64,
                        },
                    });
                }
            });
        }
        records
    }

    // ------------------------------------------------------------------
    // 2. Chemical fingerprint (dilution detection)
    // ------------------------------------------------------------------

    fn detect_chemical_fingerprint(
        &self,
        by_factory: &BTreeMap<String, Vec<HistRow<'_>>>,
    ) -> Vec<TamperRecord> {
        let mut records = Vec::new();
        let window = Duration::minutes(FINGERPRINT_WINDOW_MINUTES);

        for (factory_id, group) in by_factory {
            let clean: Vec<(&HistRow<'_>, f64, f64)> = group
                .iter()
                .filter_map(|r| match (r.cod, r.tss) {
                    (Some(cod), Some(tss)) => Some((r, cod, tss)),
                    _ => None,
                })
                .collect();
            if clean.len() < 6 {
                continue;
            }

            let mut prev: Option<(f64, f64)> = None;
            for_each_tumbling_window(clean.iter().map(|(r, _, _)| r.ts), window, |lo, hi| {
                let in_window: Vec<&(&HistRow<'_>, f64, f64)> = clean
                    .iter()
                    .filter(|(r, _, _)| r.ts >= lo && r.ts < hi)
                    .collect();
                if in_window.len() < 3 {
                    return;
                }
                #[allow(clippy::cast_precision_loss)]
                let n = in_window.len() as f64;
                let mean_cod: f64 = in_window.iter().map(|(_, c, _)| c).sum::<f64>() / n;
                let mean_tss: f64 = in_window.iter().map(|(_, _, t)| t).sum::<f64>() / n;

                if let Some((prev_cod, prev_tss)) = prev {
                    let cod_collapsed = mean_cod <= prev_cod * (1.0 - self.cod_drop_fraction);
                    let tss_held = mean_tss >= prev_tss * (1.0 - self.tss_stable_fraction);
                    if cod_collapsed && tss_held {
                        records.push(TamperRecord {
                            tamper_type: TamperType::DilutionTamper,
                            factory_id: factory_id.clone(),
                            window_end: in_window
                                .last()
                                .map(|(r, _, _)| r.time.to_string())
                                .unwrap_or_default(),
                            detail: TamperDetail::Dilution {
                                mean_cod: round_to(mean_cod, 2),
                                mean_tss: round_to(mean_tss, 2),
                                baseline_cod: round_to(prev_cod, 2),
                                baseline_tss: round_to(prev_tss, 2),
                            },
                        });
                    }
                }
                prev = Some((mean_cod, mean_tss));
            });
        }
        records
    }

    // ------------------------------------------------------------------
    // 3. Blackout (guilt by disconnection)
    // ------------------------------------------------------------------

    fn detect_blackouts(
        &self,
        by_factory: &BTreeMap<String, Vec<HistRow<'_>>>,
    ) -> Vec<TamperRecord> {
        let mut records = Vec::new();
        let window = Duration::minutes(self.blackout_min_minutes);

        for (factory_id, group) in by_factory {
            // Full stream, nulls included — the nulls ARE the signal.
            for_each_tumbling_window(group.iter().map(|r| r.ts), window, |lo, hi| {
                let in_window: Vec<&HistRow<'_>> =
                    group.iter().filter(|r| r.ts >= lo && r.ts < hi).collect();
                if (in_window.len() as i64) < self.blackout_min_minutes {
                    return;
                }
                let total_rows = in_window.len() as u64;
                let blackout_rows = in_window.iter().filter(|r| r.cod.is_none()).count() as u64;
                #[allow(clippy::cast_precision_loss)]
                let ratio = blackout_rows as f64 / total_rows as f64;
                if ratio >= BLACKOUT_RATIO_THRESHOLD {
                    records.push(TamperRecord {
                        tamper_type: TamperType::BlackoutTamper,
                        factory_id: factory_id.clone(),
                        window_end: in_window
                            .last()
                            .map(|r| r.time.to_string())
                            .unwrap_or_default(),
                        detail: TamperDetail::Blackout {
                            total_rows,
                            blackout_rows,
                            blackout_ratio: round_to(ratio, 3),
                        },
                    });
                }
            });
        }
        records
    }
}

/// Walk tumbling windows `[t, t + width)` from the first to the last
/// timestamp of a sorted sequence, invoking the callback per window.
fn for_each_tumbling_window<I, F>(timestamps: I, width: Duration, mut f: F)
where
    I: IntoIterator<Item = NaiveDateTime>,
    F: FnMut(NaiveDateTime, NaiveDateTime),
{
    let mut iter = timestamps.into_iter();
    let Some(first) = iter.next() else {
        return;
    };
    let last = iter.last().unwrap_or(first);

    let mut t = first;
    while t <= last {
        let t_end = t + width;
        f(t, t_end);
        t = t_end;
    }
}

fn last_time(rows: &[&(&HistRow<'_>, f64)]) -> String {
    rows.last().map(|(r, _)| r.time.to_string()).unwrap_or_default()
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowStatus;

    fn settings() -> Settings {
        Settings {
            zero_variance_minutes: 5,
            blackout_min_minutes: 5,
            cod_drop_fraction: 0.8,
            tss_stable_fraction: 0.2,
            ..Settings::default()
        }
    }

    fn row(factory: &str, time: &str, cod: Option<f64>, tss: Option<f64>) -> FactoryRow {
        FactoryRow {
            s_no: 0,
            time: time.to_string(),
            factory_id: factory.to_string(),
            cod,
            bod: None,
            ph: None,
            tss,
            status: if cod.is_some() {
                RowStatus::Normal
            } else {
                RowStatus::Blackout
            },
        }
    }

    /// Minute-spaced rows starting at 12:00.
    fn minutes(factory: &str, values: &[Option<f64>]) -> Vec<FactoryRow> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                row(
                    factory,
                    &format!("2026-02-01 12:{i:02}"),
                    *v,
                    v.map(|_| 200.0),
                )
            })
            .collect()
    }

    #[test]
    fn frozen_cod_flags_zero_variance_per_window() {
        let ac = AntiCheat::new(&settings());
        // 10 minutes of a fixed 115.00 reading → two 5-minute windows flagged.
        let rows = minutes("FACTORY_C", &[Some(115.0); 10]);
        let records = ac.run_all(&rows);
        let zv: Vec<_> = records
            .iter()
            .filter(|r| r.tamper_type == TamperType::ZeroVariance)
            .collect();
        assert_eq!(zv.len(), 2);
        match &zv[0].detail {
            TamperDetail::ZeroVariance {
                cod_max,
                cod_min,
                cod_range,
                row_count,
            } => {
                assert_eq!(*cod_max, 115.0);
                assert_eq!(*cod_min, 115.0);
                assert!(*cod_range < 1e-4);
                assert_eq!(*row_count, 5);
            }
            other => panic!("wrong detail: {other:?}"),
        }
    }

    #[test]
    fn varying_cod_does_not_flag() {
        let ac = AntiCheat::new(&settings());
        let rows = minutes(
            "FACTORY_A",
            &[Some(100.0), Some(101.0), Some(99.5), Some(102.0), Some(98.0)],
        );
        let records = ac.run_all(&rows);
        assert!(records
            .iter()
            .all(|r| r.tamper_type != TamperType::ZeroVariance));
    }

    #[test]
    fn single_sample_window_is_ignored() {
        let ac = AntiCheat::new(&settings());
        let rows = vec![row("FACTORY_A", "2026-02-01 12:00", Some(100.0), None)];
        assert!(ac.run_all(&rows).is_empty());
    }

    #[test]
    fn dilution_flags_cod_collapse_with_stable_tss() {
        let ac = AntiCheat::new(&settings());
        let mut rows = Vec::new();
        // First hour: COD 500, TSS 300 (10 rows, 6-min spacing).
        for i in 0..10 {
            rows.push(row(
                "FACTORY_B",
                &format!("2026-02-01 12:{:02}", i * 6),
                Some(500.0),
                Some(300.0),
            ));
        }
        // Second hour: COD 50 (90% drop), TSS 290 (held).
        for i in 0..10 {
            rows.push(row(
                "FACTORY_B",
                &format!("2026-02-01 13:{:02}", i * 6),
                Some(50.0),
                Some(290.0),
            ));
        }
        let records = ac.run_all(&rows);
        let fp: Vec<_> = records
            .iter()
            .filter(|r| r.tamper_type == TamperType::DilutionTamper)
            .collect();
        assert_eq!(fp.len(), 1);
        match &fp[0].detail {
            TamperDetail::Dilution {
                mean_cod,
                mean_tss,
                baseline_cod,
                baseline_tss,
            } => {
                assert_eq!(*mean_cod, 50.0);
                assert_eq!(*mean_tss, 290.0);
                assert_eq!(*baseline_cod, 500.0);
                assert_eq!(*baseline_tss, 300.0);
            }
            other => panic!("wrong detail: {other:?}"),
        }
    }

    #[test]
    fn dilution_needs_tss_to_hold() {
        let ac = AntiCheat::new(&settings());
        let mut rows = Vec::new();
        for i in 0..10 {
            rows.push(row(
                "FACTORY_B",
                &format!("2026-02-01 12:{:02}", i * 6),
                Some(500.0),
                Some(300.0),
            ));
        }
        // COD and TSS both collapse: a genuine shutdown, not dilution.
        for i in 0..10 {
            rows.push(row(
                "FACTORY_B",
                &format!("2026-02-01 13:{:02}", i * 6),
                Some(50.0),
                Some(20.0),
            ));
        }
        let records = ac.run_all(&rows);
        assert!(records
            .iter()
            .all(|r| r.tamper_type != TamperType::DilutionTamper));
    }

    #[test]
    fn blackout_flags_mostly_null_windows() {
        let ac = AntiCheat::new(&settings());
        // 5-minute window, 5 rows: 4 null + 1 numeric = 80% blackout.
        let rows = minutes(
            "FACTORY_D",
            &[None, None, None, None, Some(120.0)],
        );
        let records = ac.run_all(&rows);
        let bo: Vec<_> = records
            .iter()
            .filter(|r| r.tamper_type == TamperType::BlackoutTamper)
            .collect();
        assert_eq!(bo.len(), 1);
        match &bo[0].detail {
            TamperDetail::Blackout {
                total_rows,
                blackout_rows,
                blackout_ratio,
            } => {
                assert_eq!(*total_rows, 5);
                assert_eq!(*blackout_rows, 4);
                assert_eq!(*blackout_ratio, 0.8);
            }
            other => panic!("wrong detail: {other:?}"),
        }
    }

    #[test]
    fn short_windows_never_evaluate_blackout_ratio() {
        let ac = AntiCheat::new(&settings());
        // Only 3 rows in a 5-minute detector: below the minimum row count.
        let rows = minutes("FACTORY_D", &[None, None, None]);
        assert!(ac.run_all(&rows).is_empty());
    }

    #[test]
    fn combined_output_sorted_by_window_end() {
        let ac = AntiCheat::new(&settings());
        let mut rows = minutes("FACTORY_C", &[Some(115.0); 10]);
        rows.extend(minutes("FACTORY_D", &[None, None, None, None, Some(1.0)]));
        let records = ac.run_all(&rows);
        assert!(records.len() >= 2);
        for pair in records.windows(2) {
            assert!(pair[0].window_end <= pair[1].window_end);
        }
    }
}
