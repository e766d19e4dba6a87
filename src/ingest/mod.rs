//! Data ingestion: CSV loading, column normalization, BLACKOUT tagging.
//!
//! Reads the CETP inlet export and the per-factory discharge CSVs into typed
//! rows. Responsibilities:
//!
//! 1. Rename raw MPCB column headers to canonical short names.
//! 2. Parse numeric columns tolerantly — blank and "NA" markers become null,
//!    never an error.
//! 3. Tag each factory row NORMAL (numeric COD) or BLACKOUT (null COD).
//! 4. Preserve insertion order per source file (files read in name order).
//!
//! The full factory stream (BLACKOUT rows included) feeds anti-cheat; the
//! numeric-only clean stream feeds the scored path and the backtrack index.

mod source;

pub use source::{RecordSource, ReplaySource, SourceEvent};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::types::{CetpRow, FactoryRow, RowStatus};

/// Errors raised while loading input directories.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("input directory not found: {0}")]
    MissingDirectory(PathBuf),

    #[error("no CSV files found in {0}")]
    EmptyDirectory(PathBuf),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
}

// ============================================================================
// Column name mapping (long MPCB names → short internal names)
// ============================================================================

/// Maps a raw CSV header to its canonical field name. Already-canonical
/// headers map to themselves so re-exported files round-trip.
fn cetp_column_map() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("S. No", "s_no"),
        ("Time", "time"),
        ("CETP_INLET-COD - (mg/l) Raw", "cetp_inlet_cod"),
        ("CETP_INLET-BOD - (mg/l) Raw", "cetp_inlet_bod"),
        ("CETP_INLET-pH - (pH) Raw", "cetp_inlet_ph"),
        ("CETP_INLET-TSS - (mg/l) Raw", "cetp_inlet_tss"),
        ("CETP_OUTLET-COD - (mg/l) Raw", "cetp_outlet_cod"),
        ("CETP_OUTLET-BOD - (mg/l) Raw", "cetp_outlet_bod"),
        ("CETP_OUTLET-pH - (pH) Raw", "cetp_outlet_ph"),
        ("CETP_OUTLET-TSS - (mg/l) Raw", "cetp_outlet_tss"),
    ])
}

fn factory_column_map() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("S. No", "s_no"),
        ("Time", "time"),
        ("factory_id", "factory_id"),
        ("COD - (mg/l) Raw", "cod"),
        ("BOD - (mg/l) Raw", "bod"),
        ("pH - (pH) Raw", "ph"),
        ("TSS - (mg/l) Raw", "tss"),
    ])
}

/// Resolve a header to its canonical name: mapped if known, lower-cased
/// as-is otherwise (covers files already written with canonical headers).
fn canonicalize(header: &str, map: &HashMap<&'static str, &'static str>) -> String {
    map.get(header.trim())
        .map_or_else(|| header.trim().to_lowercase(), |c| (*c).to_string())
}

// ============================================================================
// Tolerant field parsing
// ============================================================================

/// Parse a numeric field, treating blank and "NA" markers (and any other
/// unparseable content) as null. Rows never fail on a bad numeric cell.
fn parse_optional_f64(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("na") {
        return None;
    }
    trimmed.parse().ok()
}

fn parse_s_no(raw: &str, fallback: u64) -> u64 {
    raw.trim().parse().unwrap_or(fallback)
}

// ============================================================================
// Directory listing
// ============================================================================

/// List CSV files in a directory matching an optional filename prefix,
/// sorted by name so replay order is deterministic.
fn list_csv_files(dir: &Path, prefix: Option<&str>) -> Result<Vec<PathBuf>, IngestError> {
    if !dir.is_dir() {
        return Err(IngestError::MissingDirectory(dir.to_path_buf()));
    }
    let entries = std::fs::read_dir(dir).map_err(|source| IngestError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("csv"))
        .filter(|p| {
            prefix.map_or(true, |pre| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(pre))
            })
        })
        .collect();
    files.sort();
    if files.is_empty() {
        return Err(IngestError::EmptyDirectory(dir.to_path_buf()));
    }
    Ok(files)
}

// ============================================================================
// CETP loader
// ============================================================================

/// Load all CETP CSVs in a directory into rows, preserving file order.
///
/// Every row is returned, null inlet COD included — the tripwire only sees
/// numeric readings, but outlet columns stay available to future consumers.
pub fn load_cetp_rows(cetp_dir: &Path) -> Result<Vec<CetpRow>, IngestError> {
    let map = cetp_column_map();
    let mut rows = Vec::new();

    for path in list_csv_files(cetp_dir, None)? {
        let mut reader = open_reader(&path)?;
        let columns = header_positions(&mut reader, &map, &path)?;
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|source| IngestError::Csv {
                path: path.clone(),
                source,
            })?;
            let field = |name: &str| columns.get(name).and_then(|&i| record.get(i)).unwrap_or("");
            rows.push(CetpRow {
                s_no: parse_s_no(field("s_no"), line as u64 + 1),
                time: field("time").trim().to_string(),
                cetp_inlet_cod: parse_optional_f64(field("cetp_inlet_cod")),
                cetp_inlet_bod: parse_optional_f64(field("cetp_inlet_bod")),
                cetp_inlet_ph: parse_optional_f64(field("cetp_inlet_ph")),
                cetp_inlet_tss: parse_optional_f64(field("cetp_inlet_tss")),
                cetp_outlet_cod: parse_optional_f64(field("cetp_outlet_cod")),
                cetp_outlet_bod: parse_optional_f64(field("cetp_outlet_bod")),
                cetp_outlet_ph: parse_optional_f64(field("cetp_outlet_ph")),
                cetp_outlet_tss: parse_optional_f64(field("cetp_outlet_tss")),
            });
        }
        debug!("loaded CETP file {}", path.display());
    }

    info!("CETP ingest: {} rows from {}", rows.len(), cetp_dir.display());
    Ok(rows)
}

// ============================================================================
// Factory loader
// ============================================================================

/// Load all `factory_*.csv` files into a unified tagged row stream.
///
/// BLACKOUT rows are *not* dropped — they flow to the anti-cheat detectors.
/// Use [`clean_factory_rows`] for the numeric-only view.
pub fn load_factory_rows(factory_dir: &Path) -> Result<Vec<FactoryRow>, IngestError> {
    let map = factory_column_map();
    let mut rows = Vec::new();

    for path in list_csv_files(factory_dir, Some("factory_"))? {
        let mut reader = open_reader(&path)?;
        let columns = header_positions(&mut reader, &map, &path)?;
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|source| IngestError::Csv {
                path: path.clone(),
                source,
            })?;
            let field = |name: &str| columns.get(name).and_then(|&i| record.get(i)).unwrap_or("");
            let cod = parse_optional_f64(field("cod"));
            rows.push(FactoryRow {
                s_no: parse_s_no(field("s_no"), line as u64 + 1),
                time: field("time").trim().to_string(),
                factory_id: field("factory_id").trim().to_string(),
                cod,
                bod: parse_optional_f64(field("bod")),
                ph: parse_optional_f64(field("ph")),
                tss: parse_optional_f64(field("tss")),
                status: if cod.is_some() {
                    RowStatus::Normal
                } else {
                    RowStatus::Blackout
                },
            });
        }
        debug!("loaded factory file {}", path.display());
    }

    info!(
        "factory ingest: {} rows from {}",
        rows.len(),
        factory_dir.display()
    );
    Ok(rows)
}

/// Numeric-only view of a factory row set: BLACKOUT rows removed.
pub fn clean_factory_rows(rows: &[FactoryRow]) -> Vec<FactoryRow> {
    rows.iter()
        .filter(|r| r.status == RowStatus::Normal)
        .cloned()
        .collect()
}

// ============================================================================
// CSV plumbing
// ============================================================================

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, IngestError> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|source| IngestError::Csv {
            path: path.to_path_buf(),
            source,
        })
}

/// Map canonical field names to their column index in this file's header.
fn header_positions(
    reader: &mut csv::Reader<std::fs::File>,
    map: &HashMap<&'static str, &'static str>,
    path: &Path,
) -> Result<HashMap<String, usize>, IngestError> {
    let headers = reader.headers().map_err(|source| IngestError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(headers
        .iter()
        .enumerate()
        .map(|(i, h)| (canonicalize(h, map), i))
        .collect())
}
