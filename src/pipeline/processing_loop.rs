//! Generic record processing loop shared by the CETP and factory paths.
//!
//! Drives a [`RecordSource`] into a [`StreamStage`] under a cancellation
//! token. Per-key event order is preserved trivially: one loop owns one
//! stage chain and processes rows strictly sequentially. On EOF or
//! cancellation the stage is flushed so partial windows and open sync
//! buckets drain.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::ingest::{RecordSource, SourceEvent};

/// A stage chain that consumes one row type end-to-end.
pub trait StreamStage<R>: Send {
    /// Process one row through every owned stage.
    fn process(&mut self, row: R);

    /// Drain open state (windows, sync buckets) and flush sinks. Invoked
    /// once, when the source closes or cancellation lands.
    fn flush(&mut self);
}

/// Rows between progress log lines.
const PROGRESS_EVERY: u64 = 500;

/// Run a source to completion through a stage chain.
///
/// Returns the number of rows processed.
pub async fn run<R, S, H>(source: &mut S, stage: &mut H, cancel: &CancellationToken) -> u64
where
    R: Send,
    S: RecordSource<R>,
    H: StreamStage<R>,
{
    let name = source.source_name().to_string();
    info!("processing records from {name}...");
    let mut rows_processed = 0u64;

    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => {
                info!("[{name}] shutdown signal received — draining");
                break;
            }
            result = source.next_record() => {
                match result {
                    Ok(ev) => ev,
                    Err(e) => {
                        warn!("[{name}] source error: {e}");
                        break;
                    }
                }
            }
        };

        let row = match event {
            SourceEvent::Record(row) => row,
            SourceEvent::Eof => {
                info!("[{name}] source reached end ({rows_processed} rows processed)");
                break;
            }
        };

        rows_processed += 1;
        stage.process(row);

        if rows_processed % PROGRESS_EVERY == 0 {
            info!("[{name}] progress: {rows_processed} rows");
        }
    }

    stage.flush();
    rows_processed
}
