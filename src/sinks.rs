//! Append-only audit sinks.
//!
//! Two write disciplines:
//!
//! - [`JsonlSink`] — one JSON object per line, append-only. Opens lazily on
//!   first write, stays open for the process lifetime, and reopens on the
//!   next write after a failure. Lines are never rewritten; callers own
//!   serialization order, so concurrent writers must each own their sink.
//! - [`write_snapshot_atomic`] — full-file JSON snapshot via sibling temp
//!   file, fsync, rename. The temp file is removed if any step fails.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize record for {path}: {source}")]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Append-only JSONL writer.
pub struct JsonlSink {
    path: PathBuf,
    file: Option<File>,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single JSON line and flush it to the OS.
    ///
    /// On failure the handle is dropped so the next append reopens the
    /// file; the caller logs and continues (sink failures are never fatal).
    pub fn append<T: Serialize>(&mut self, record: &T) -> Result<(), SinkError> {
        let line = serde_json::to_string(record).map_err(|source| SinkError::Serialize {
            path: self.path.clone(),
            source,
        })?;
        self.append_line(&line)
    }

    /// Append a pre-serialized JSON line.
    pub fn append_line(&mut self, line: &str) -> Result<(), SinkError> {
        if self.file.is_none() {
            self.file = Some(self.open()?);
        }
        // The handle exists here by construction.
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        let result = writeln!(file, "{line}").and_then(|()| file.flush());
        if let Err(source) = result {
            self.file = None; // reopen on next write
            return Err(SinkError::Write {
                path: self.path.clone(),
                source,
            });
        }
        Ok(())
    }

    /// Flush and close the underlying handle (shutdown path).
    pub fn close(&mut self) {
        if let Some(mut file) = self.file.take() {
            if let Err(e) = file.flush() {
                error!(path = %self.path.display(), "sink flush failed on close: {e}");
            }
        }
    }

    fn open(&self) -> Result<File, SinkError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SinkError::Open {
                path: self.path.clone(),
                source,
            })?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| SinkError::Open {
                path: self.path.clone(),
                source,
            })
    }
}

impl Drop for JsonlSink {
    fn drop(&mut self) {
        self.close();
    }
}

/// Write a JSON snapshot atomically: temp file in the same directory,
/// fsync, then rename over the target. A failed attempt leaves no temp
/// file behind and the previous snapshot intact.
pub fn write_snapshot_atomic<T: Serialize>(path: &Path, snapshot: &T) -> Result<(), SinkError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| SinkError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let mut tmp_path = path.to_path_buf();
    tmp_path.set_extension("json.tmp");

    let json = serde_json::to_string_pretty(snapshot).map_err(|source| SinkError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    let write_result = (|| {
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(json.as_bytes())?;
        tmp.sync_all()?;
        std::fs::rename(&tmp_path, path)
    })();

    if let Err(source) = write_result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(SinkError::Write {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}
