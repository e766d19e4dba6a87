//! Record source abstraction for stream ingestion.
//!
//! Provides a unified trait for feeding rows into a processing loop. The
//! canonical mode is replay: a fixed set of CSV files is loaded fully in
//! insertion order and yielded one row at a time, then EOF. A live tailing
//! implementation can slot in behind the same trait without touching the
//! loop.

use anyhow::Result;
use async_trait::async_trait;

/// Events produced by a record source.
pub enum SourceEvent<T> {
    /// A row was read.
    Record(T),
    /// Source reached end of data.
    Eof,
}

/// Trait abstracting where rows come from.
///
/// Implementations handle file access and pacing internally. The processing
/// loop calls [`next_record`](RecordSource::next_record) in a `select!` with
/// cancellation.
#[async_trait]
pub trait RecordSource<T>: Send + 'static {
    /// Read the next row from the source.
    ///
    /// Returns `SourceEvent::Eof` when no more data is available.
    async fn next_record(&mut self) -> Result<SourceEvent<T>>;

    /// Human-readable name for logging (e.g. "CETP-CSV", "FACTORY-CSV").
    fn source_name(&self) -> &str;
}

/// Replays pre-loaded rows with optional inter-row delay.
///
/// Preserves the insertion order of the underlying files; `delay_ms = 0`
/// replays as fast as the loop can drain.
pub struct ReplaySource<T> {
    rows: std::vec::IntoIter<T>,
    delay_ms: u64,
    yielded_first: bool,
    name: String,
}

impl<T> ReplaySource<T> {
    pub fn new(rows: Vec<T>, delay_ms: u64, name: impl Into<String>) -> Self {
        Self {
            rows: rows.into_iter(),
            delay_ms,
            yielded_first: false,
            name: name.into(),
        }
    }
}

#[async_trait]
impl<T: Send + 'static> RecordSource<T> for ReplaySource<T> {
    async fn next_record(&mut self) -> Result<SourceEvent<T>> {
        // No delay before the first row so short replays start immediately.
        if self.yielded_first && self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
        match self.rows.next() {
            Some(row) => {
                self.yielded_first = true;
                Ok(SourceEvent::Record(row))
            }
            None => Ok(SourceEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}
