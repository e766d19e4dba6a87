//! CSV Replay Integration Test
//!
//! Exercises the full engine path the way the `riverguard` binary wires it:
//! temp CSV directories → ingest → CETP and factory pipelines → JSONL audit
//! logs and the atomic metrics snapshot.

use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use riverguard::backtrack::{Backtracker, FactoryIndex};
use riverguard::config::Settings;
use riverguard::ingest::{self, ReplaySource};
use riverguard::pipeline::{run_loop, CetpPipeline, FactoryPipeline, MetricsHub};
use riverguard::sinks::JsonlSink;

fn write_file(dir: &Path, name: &str, content: &str) {
    let mut f = std::fs::File::create(dir.join(name)).unwrap();
    f.write_all(content.as_bytes()).unwrap();
}

/// CETP inlet CSV: quiet baseline, then a 12:23 shock (cod 260 ≥ 250).
fn write_cetp_fixture(dir: &Path) {
    write_file(
        dir,
        "cetp_inlet.csv",
        "s_no,time,cetp_inlet_cod,cetp_inlet_bod,cetp_inlet_ph,cetp_inlet_tss\n\
         1,2026-02-01 12:00,180,60,7.4,140\n\
         2,2026-02-01 12:05,190,61,7.4,141\n\
         3,2026-02-01 12:10,NA,62,7.3,143\n\
         4,2026-02-01 12:15,185,60,7.4,140\n\
         5,2026-02-01 12:23,260,75,7.1,180\n\
         6,2026-02-01 13:00,280,78,7.0,190\n",
    );
}

/// Factory CSVs: B dumps hard at 12:08 (the 12:23 shock's backtrack match);
/// nobody discharges near 12:45 (the 13:00 shock finds no match).
fn write_factory_fixture(dir: &Path) {
    write_file(
        dir,
        "factory_a.csv",
        "s_no,time,factory_id,cod,bod,ph,tss\n\
         1,2026-02-01 12:07,FACTORY_A,220,70,7.2,110\n\
         2,2026-02-01 12:09,FACTORY_A,225,71,7.2,112\n",
    );
    write_file(
        dir,
        "factory_b.csv",
        "s_no,time,factory_id,cod,bod,ph,tss\n\
         1,2026-02-01 12:08,FACTORY_B,450,130,6.9,300\n\
         2,2026-02-01 12:12,FACTORY_B,120,40,7.1,90\n",
    );
}

fn settings_for(dir: &Path) -> Settings {
    Settings {
        evidence_log_path: dir.join("evidence.jsonl").to_string_lossy().into_owned(),
        alert_log_path: dir.join("alerts.jsonl").to_string_lossy().into_owned(),
        quarantine_log_path: dir.join("quarantine.jsonl").to_string_lossy().into_owned(),
        tamper_log_path: dir.join("tamper.jsonl").to_string_lossy().into_owned(),
        metrics_output_path: dir.join("metrics.json").to_string_lossy().into_owned(),
        ..Settings::default()
    }
}

fn read_jsonl(path: &Path) -> Vec<serde_json::Value> {
    if !path.exists() {
        return Vec::new();
    }
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).expect("every sink line is valid JSON"))
        .collect()
}

#[tokio::test]
async fn replay_attributes_shocks_and_snapshots_metrics() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let cetp_dir = input.path().join("cetp");
    let factory_dir = input.path().join("factory");
    std::fs::create_dir_all(&cetp_dir).unwrap();
    std::fs::create_dir_all(&factory_dir).unwrap();
    write_cetp_fixture(&cetp_dir);
    write_factory_fixture(&factory_dir);

    let settings = settings_for(output.path());

    // Mirror the binary's wiring: eager loads, then one loop per source.
    let factory_rows = ingest::load_factory_rows(&factory_dir).unwrap();
    let cetp_rows = ingest::load_cetp_rows(&cetp_dir).unwrap();
    let index = FactoryIndex::from_rows(&factory_rows, &settings);

    let quarantine = Arc::new(Mutex::new(JsonlSink::new(&settings.quarantine_log_path)));
    let metrics = Arc::new(MetricsHub::new(&settings));
    let mut cetp = CetpPipeline::new(
        &settings,
        Backtracker::new(index, &settings),
        quarantine.clone(),
        metrics.clone(),
    );
    let mut factory = FactoryPipeline::new(&settings, quarantine.clone(), metrics.clone());

    let cancel = CancellationToken::new();
    let mut cetp_source = ReplaySource::new(cetp_rows, 0, "CETP-CSV");
    let mut factory_source = ReplaySource::new(factory_rows, 0, "FACTORY-CSV");
    let cetp_done = run_loop(&mut cetp_source, &mut cetp, &cancel).await;
    let factory_done = run_loop(&mut factory_source, &mut factory, &cancel).await;
    metrics.final_snapshot();

    assert_eq!(cetp_done, 6);
    assert_eq!(factory_done, 4);

    // Two shocks, in CETP event order.
    let evidence = read_jsonl(&output.path().join("evidence.jsonl"));
    assert_eq!(evidence.len(), 2);

    // 12:23 shock → FACTORY_B at 12:08 (max COD in the ±120 s window).
    let first = &evidence[0];
    assert_eq!(first["cetp_event_time"], "2026-02-01 12:23");
    assert_eq!(first["cetp_cod"], 260.0);
    assert_eq!(first["breach_mag"], 67.0);
    assert_eq!(first["alert_level"], "MEDIUM");
    assert_eq!(first["backtrack_time"], "2026-02-01 12:08");
    assert_eq!(first["attributed_factory"], "FACTORY_B");
    assert_eq!(first["factory_cod"], 450.0);
    assert_eq!(first["factory_tss"], 300.0);

    // 13:00 shock → no factory rows near 12:45: null attribution, logged.
    let second = &evidence[1];
    assert_eq!(second["backtrack_time"], "2026-02-01 12:45");
    assert!(second["attributed_factory"].is_null());
    assert!(second["factory_cod"].is_null());

    // Every evidence line carries a logged_at stamp.
    for record in &evidence {
        assert!(record["logged_at"].as_str().is_some());
    }

    // Metrics snapshot: all 10 input rows counted, event clock at the end.
    let snapshot: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output.path().join("metrics.json")).unwrap())
            .unwrap();
    assert_eq!(snapshot["events_processed_total"], 10);
    assert_eq!(snapshot["last_event_timestamp"], "2026-02-01 13:00");
    assert!(snapshot["pipeline_uptime_seconds"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn evidence_log_appends_across_restarts() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let cetp_dir = input.path().join("cetp");
    let factory_dir = input.path().join("factory");
    std::fs::create_dir_all(&cetp_dir).unwrap();
    std::fs::create_dir_all(&factory_dir).unwrap();
    write_cetp_fixture(&cetp_dir);
    write_factory_fixture(&factory_dir);

    let settings = settings_for(output.path());

    for _ in 0..2 {
        let factory_rows = ingest::load_factory_rows(&factory_dir).unwrap();
        let cetp_rows = ingest::load_cetp_rows(&cetp_dir).unwrap();
        let index = FactoryIndex::from_rows(&factory_rows, &settings);
        let quarantine = Arc::new(Mutex::new(JsonlSink::new(&settings.quarantine_log_path)));
        let metrics = Arc::new(MetricsHub::new(&settings));
        let mut cetp = CetpPipeline::new(
            &settings,
            Backtracker::new(index, &settings),
            quarantine,
            metrics,
        );
        let cancel = CancellationToken::new();
        let mut source = ReplaySource::new(cetp_rows, 0, "CETP-CSV");
        run_loop(&mut source, &mut cetp, &cancel).await;
    }

    // Two replays × two shocks: the log appended, never rewrote.
    let evidence = read_jsonl(&output.path().join("evidence.jsonl"));
    assert_eq!(evidence.len(), 4);
    assert_eq!(evidence[0]["cetp_event_time"], evidence[2]["cetp_event_time"]);
}

#[tokio::test]
async fn quiet_streams_leave_audit_logs_empty() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let cetp_dir = input.path().join("cetp");
    std::fs::create_dir_all(&cetp_dir).unwrap();
    // All below the 250 threshold.
    write_file(
        &cetp_dir,
        "cetp_inlet.csv",
        "s_no,time,cetp_inlet_cod,cetp_inlet_bod,cetp_inlet_ph,cetp_inlet_tss\n\
         1,2026-02-01 12:00,180,60,7.4,140\n\
         2,2026-02-01 12:05,190,61,7.4,141\n\
         3,2026-02-01 12:10,185,60,7.4,140\n",
    );

    let settings = settings_for(output.path());
    let cetp_rows = ingest::load_cetp_rows(&cetp_dir).unwrap();
    let index = FactoryIndex::from_rows(&[], &settings);
    let quarantine = Arc::new(Mutex::new(JsonlSink::new(&settings.quarantine_log_path)));
    let metrics = Arc::new(MetricsHub::new(&settings));
    let mut cetp = CetpPipeline::new(
        &settings,
        Backtracker::new(index, &settings),
        quarantine,
        metrics,
    );

    let cancel = CancellationToken::new();
    let mut source = ReplaySource::new(cetp_rows, 0, "CETP-CSV");
    run_loop(&mut source, &mut cetp, &cancel).await;

    assert!(!output.path().join("evidence.jsonl").exists());
    assert!(!output.path().join("quarantine.jsonl").exists());
}
