//! Riverguard pipeline runner.
//!
//! Replays the CETP inlet and factory discharge CSV directories through the
//! full analytic engine. The factory index for backtrack attribution is
//! loaded eagerly before streaming starts.
//!
//! # Usage
//!
//! ```bash
//! riverguard --cetp-dir data/cetp --factory-dir data/factory
//!
//! # Paced replay (~1 row/s per source at speed 60)
//! riverguard --cetp-dir data/cetp --factory-dir data/factory --speed 60
//! ```
//!
//! Exit codes: 0 normal shutdown, 1 config validation failure, 2 missing
//! input directory. Ctrl-C drains the current rows, flushes every sink,
//! and writes a final metrics snapshot.
//!
//! # Environment Variables
//!
//! - `RIVERGUARD_*`: every pipeline tunable (see `config::defaults`)
//! - `RUST_LOG`: logging filter (default: info)

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};

use riverguard::backtrack::{Backtracker, FactoryIndex};
use riverguard::config::{self, Settings};
use riverguard::ingest::{self, ReplaySource};
use riverguard::pipeline::{run_loop, CetpPipeline, FactoryPipeline, MetricsHub};
use riverguard::sinks::JsonlSink;
use riverguard::startup;

/// Base delay denominator for the `--speed` flag:
/// `delay_ms = REPLAY_BASE_DELAY_MS / speed`.
const REPLAY_BASE_DELAY_MS: u64 = 60_000;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "riverguard")]
#[command(about = "Riverguard CETP discharge monitoring and attribution pipeline")]
#[command(version)]
struct CliArgs {
    /// Directory containing the CETP inlet CSV file(s)
    #[arg(long, value_name = "DIR", default_value = "data/cetp")]
    cetp_dir: PathBuf,

    /// Directory containing factory_*.csv discharge files
    #[arg(long, value_name = "DIR", default_value = "data/factory")]
    factory_dir: PathBuf,

    /// Replay speed multiplier (0 = no delay, 60 = one row per second)
    #[arg(long, default_value = "0")]
    speed: u64,
}

// ============================================================================
// Entry point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();

    // Per-process correlation id, attached to the tracing context so every
    // log line of this run carries `run_id`.
    let run_id = uuid::Uuid::new_v4().to_string();
    let run_span = tracing::info_span!("run", run_id = %run_id);

    // Config: parse failures and validation errors are fatal before any
    // processing starts.
    let settings = {
        let _guard = run_span.enter();
        let settings = match Settings::from_env() {
            Ok(s) => s,
            Err(e) => {
                error!("configuration error: {e}");
                return ExitCode::from(1);
            }
        };
        let (errors, warnings) = config::validate(&settings);
        for warning in &warnings {
            warn!("config warning: {warning}");
        }
        if !errors.is_empty() {
            for err in &errors {
                error!("config error: {err}");
            }
            return ExitCode::from(1);
        }
        config::init(settings.clone());

        startup::log_summary(&settings, &run_id);
        settings
    };

    let result = run_pipeline(&args, &settings)
        .instrument(run_span.clone())
        .await;

    let _guard = run_span.enter();
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(PipelineError::MissingInput(e)) => {
            error!("{e}");
            ExitCode::from(2)
        }
    }
}

enum PipelineError {
    MissingInput(ingest::IngestError),
}

async fn run_pipeline(args: &CliArgs, settings: &Settings) -> Result<(), PipelineError> {
    // Eager loads: both replay row sets and the backtrack index, before any
    // streaming begins.
    let factory_rows =
        ingest::load_factory_rows(&args.factory_dir).map_err(PipelineError::MissingInput)?;
    let cetp_rows = ingest::load_cetp_rows(&args.cetp_dir).map_err(PipelineError::MissingInput)?;
    let factory_index = FactoryIndex::from_rows(&factory_rows, settings);

    let delay_ms = if args.speed == 0 {
        0
    } else {
        REPLAY_BASE_DELAY_MS / args.speed
    };
    info!(
        "replay: {} CETP rows, {} factory rows, {} ms inter-row delay",
        cetp_rows.len(),
        factory_rows.len(),
        delay_ms
    );

    // Shared state: quarantine sink and metrics hub; everything else is
    // owned by exactly one path.
    let quarantine = Arc::new(Mutex::new(JsonlSink::new(&settings.quarantine_log_path)));
    let metrics = Arc::new(MetricsHub::new(settings));

    let mut cetp_pipeline = CetpPipeline::new(
        settings,
        Backtracker::new(factory_index, settings),
        quarantine.clone(),
        metrics.clone(),
    );
    let mut factory_pipeline = FactoryPipeline::new(settings, quarantine.clone(), metrics.clone());

    let cancel = CancellationToken::new();

    // Ctrl-C → graceful drain. Spawned tasks do not inherit the current
    // span, so each is instrumented with it explicitly to keep `run_id` on
    // every log line.
    let ctrlc_cancel = cancel.clone();
    tokio::spawn(
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received — draining pipeline");
                ctrlc_cancel.cancel();
            }
        }
        .instrument(tracing::Span::current()),
    );

    let cetp_cancel = cancel.clone();
    let cetp_task = tokio::spawn(
        async move {
            let mut source = ReplaySource::new(cetp_rows, delay_ms, "CETP-CSV");
            run_loop(&mut source, &mut cetp_pipeline, &cetp_cancel).await
        }
        .instrument(tracing::Span::current()),
    );

    let factory_cancel = cancel.clone();
    let factory_task = tokio::spawn(
        async move {
            let mut source = ReplaySource::new(factory_rows, delay_ms, "FACTORY-CSV");
            run_loop(&mut source, &mut factory_pipeline, &factory_cancel).await
        }
        .instrument(tracing::Span::current()),
    );

    let cetp_rows_done = cetp_task.await.unwrap_or_else(|e| {
        error!("CETP task failed: {e}");
        0
    });
    let factory_rows_done = factory_task.await.unwrap_or_else(|e| {
        error!("factory task failed: {e}");
        0
    });

    metrics.final_snapshot();
    if let Ok(mut sink) = quarantine.lock() {
        sink.close();
    }

    info!("pipeline complete: {cetp_rows_done} CETP rows, {factory_rows_done} factory rows");
    Ok(())
}
