//! Anti-Cheat Integration Test
//!
//! Builds factory CSV fixtures exhibiting the three tamper signatures —
//! frozen COD (factory C), bucket dilution (factory B), sensor blackout
//! (factory D) — loads them through the real ingest path, and asserts each
//! detector fires on its culprit and stays silent on the honest factory.

use std::io::Write;
use std::path::Path;

use riverguard::anticheat::AntiCheat;
use riverguard::config::Settings;
use riverguard::ingest;
use riverguard::types::TamperType;

fn write_file(dir: &Path, name: &str, content: &str) {
    let mut f = std::fs::File::create(dir.join(name)).unwrap();
    f.write_all(content.as_bytes()).unwrap();
}

fn csv_header() -> &'static str {
    "s_no,time,factory_id,cod,bod,ph,tss\n"
}

/// Honest factory: noisy but plausible discharge.
fn honest_factory_csv() -> String {
    let mut csv = csv_header().to_string();
    for i in 0..30 {
        csv.push_str(&format!(
            "{},2026-02-01 12:{:02},FACTORY_A,{},70,7.2,110\n",
            i + 1,
            i,
            200.0 + f64::from(i % 7) * 3.0,
        ));
    }
    csv
}

/// Factory C: COD frozen at exactly 115.00 — digital copy-paste.
fn frozen_factory_csv() -> String {
    let mut csv = csv_header().to_string();
    for i in 0..10 {
        csv.push_str(&format!(
            "{},2026-02-01 12:{:02},FACTORY_C,115.00,55,7.0,95\n",
            i + 1,
            i,
        ));
    }
    csv
}

/// Factory B: an hour at full strength, then COD collapses 90% while TSS
/// holds — bucket dilution.
fn diluting_factory_csv() -> String {
    let mut csv = csv_header().to_string();
    let mut s_no = 1;
    for i in 0..10 {
        csv.push_str(&format!(
            "{s_no},2026-02-01 12:{:02},FACTORY_B,500,150,6.9,300\n",
            i * 6,
        ));
        s_no += 1;
    }
    for i in 0..10 {
        csv.push_str(&format!(
            "{s_no},2026-02-01 13:{:02},FACTORY_B,50,20,7.3,290\n",
            i * 6,
        ));
        s_no += 1;
    }
    csv
}

/// Factory D: 4 of 5 rows are NA — strategic blackout before a dump.
fn blackout_factory_csv() -> String {
    let mut csv = csv_header().to_string();
    for i in 0..5 {
        let cod = if i == 4 { "130" } else { "NA" };
        csv.push_str(&format!(
            "{},2026-02-01 12:{:02},FACTORY_D,{cod},NA,NA,NA\n",
            i + 1,
            i,
        ));
    }
    csv
}

fn detector_settings() -> Settings {
    Settings {
        zero_variance_minutes: 5,
        blackout_min_minutes: 5,
        cod_drop_fraction: 0.8,
        tss_stable_fraction: 0.2,
        ..Settings::default()
    }
}

#[test]
fn detectors_flag_their_culprits_and_spare_the_honest() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "factory_a.csv", &honest_factory_csv());
    write_file(dir.path(), "factory_b.csv", &diluting_factory_csv());
    write_file(dir.path(), "factory_c.csv", &frozen_factory_csv());
    write_file(dir.path(), "factory_d.csv", &blackout_factory_csv());

    let rows = ingest::load_factory_rows(dir.path()).unwrap();
    let records = AntiCheat::new(&detector_settings()).run_all(&rows);

    // Zero-variance fires on factory C only — one record per frozen window.
    let zv: Vec<_> = records
        .iter()
        .filter(|r| r.tamper_type == TamperType::ZeroVariance)
        .collect();
    assert!(!zv.is_empty());
    assert!(zv.iter().all(|r| r.factory_id == "FACTORY_C"));

    // Dilution fires on factory B only.
    let fp: Vec<_> = records
        .iter()
        .filter(|r| r.tamper_type == TamperType::DilutionTamper)
        .collect();
    assert_eq!(fp.len(), 1);
    assert_eq!(fp[0].factory_id, "FACTORY_B");

    // Blackout fires on factory D only.
    let bo: Vec<_> = records
        .iter()
        .filter(|r| r.tamper_type == TamperType::BlackoutTamper)
        .collect();
    assert_eq!(bo.len(), 1);
    assert_eq!(bo[0].factory_id, "FACTORY_D");

    // The honest factory is never named.
    assert!(records.iter().all(|r| r.factory_id != "FACTORY_A"));

    // Combined output is ordered by window end.
    for pair in records.windows(2) {
        assert!(pair[0].window_end <= pair[1].window_end);
    }
}

#[test]
fn clean_fleet_produces_no_records() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "factory_a.csv", &honest_factory_csv());

    let rows = ingest::load_factory_rows(dir.path()).unwrap();
    let records = AntiCheat::new(&detector_settings()).run_all(&rows);
    assert!(records.is_empty(), "unexpected detections: {records:?}");
}
