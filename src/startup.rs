//! Startup diagnostic summary.
//!
//! An 80-column ASCII banner logged once at startup: architecture flow,
//! active configuration, detector inventory, data directories. ASCII-only
//! box drawing so any terminal or log aggregator renders it intact.

use crate::config::Settings;

const WIDTH: usize = 80;

fn line(fill: char) -> String {
    format!("+{}+", fill.to_string().repeat(WIDTH - 2))
}

fn center(text: &str) -> String {
    format!("| {:^width$} |", text, width = WIDTH - 4)
}

fn left(text: &str) -> String {
    format!("| {:<width$} |", text, width = WIDTH - 4)
}

/// Build the banner lines for logging.
pub fn format_summary(settings: &Settings, run_id: &str) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push(line('='));
    lines.push(center("RIVERGUARD - CETP Discharge Monitoring & Attribution"));
    lines.push(center(&format!("run {run_id}")));
    lines.push(line('-'));

    lines.push(center("Pipeline Architecture"));
    for row in [
        "CETP: ingest -> validate -> tripwire -> backtrack -> evidence log",
        "Factory: validate -> window stats -> z-score -> persistence ->",
        "multivariate -> attribution -> ERI -> alert router -> alert log",
        "Anti-cheat (batch): zero-variance | dilution | blackout -> tamper log",
    ] {
        lines.push(center(row));
    }
    lines.push(line('-'));

    lines.push(center("Active Configuration"));
    lines.push(left(&format!(
        "window: {} ms / hop {} ms | z-threshold: {} | persistence: {}",
        settings.window_duration_ms,
        settings.window_hop_ms,
        settings.zscore_threshold,
        settings.persistence_count
    )));
    lines.push(left(&format!(
        "groups: {} | sync tolerance: {} ms | group threshold: {}",
        settings.sensor_groups.len(),
        settings.sync_tolerance_ms,
        settings.group_threshold
    )));
    lines.push(left(&format!(
        "COD baseline/threshold: {} / {} mg/L | pipe travel: {} min (tol {} s)",
        settings.cod_baseline,
        settings.cod_threshold,
        settings.pipe_travel_minutes,
        settings.asof_tolerance_seconds
    )));
    lines.push(left(&format!(
        "ERI bands: <{} LOW | <{} MEDIUM | <{} HIGH | else CRITICAL (x{})",
        settings.eri_threshold_low,
        settings.eri_threshold_medium,
        settings.eri_threshold_high,
        settings.severity_multiplier
    )));
    lines.push(left(&format!(
        "alert gate: min band {} | cooldown {} s",
        settings.alert_min_risk_band, settings.alert_cooldown_seconds
    )));
    lines.push(line('-'));

    lines.push(center("Audit Outputs"));
    lines.push(left(&format!("evidence   : {}", settings.evidence_log_path)));
    lines.push(left(&format!("alerts     : {}", settings.alert_log_path)));
    lines.push(left(&format!("tamper     : {}", settings.tamper_log_path)));
    lines.push(left(&format!("quarantine : {}", settings.quarantine_log_path)));
    lines.push(left(&format!("metrics    : {}", settings.metrics_output_path)));
    lines.push(line('='));

    lines
}

/// Log the banner at INFO, one line per row.
pub fn log_summary(settings: &Settings, run_id: &str) {
    for line in format_summary(settings, run_id) {
        tracing::info!("{line}");
    }
}
