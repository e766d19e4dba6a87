//! Temporal backtrack: the attribution engine for CETP shocks.
//!
//! For a shock at time T, the plume that caused it left its factory one
//! pipe-travel-time earlier. The engine holds a static, time-sorted index of
//! factory discharge rows (loaded eagerly at startup) and, per shock,
//! searches `[T − travel − tol, T − travel + tol]` for the row with the
//! **maximum COD** — highest discharge at the right time wins. Ties break
//! deterministically: latest timestamp, then lexicographically smallest
//! factory id.
//!
//! An empty window still produces an evidence record, with null attribution
//! and the backtrack time logged.
//!
//! The factory data being historical and static is what makes an in-memory
//! index correct here; a live factory feed would replace this index with a
//! merged-stream temporal join behind the same lookup seam (see DESIGN.md).

use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::config::Settings;
use crate::ingest;
use crate::types::{parse_event_time, round2, utc_now_iso, EvidenceRecord, ShockEvent};

/// One indexed factory discharge row. COD is always present — null-COD rows
/// never enter the index.
#[derive(Debug, Clone)]
pub struct IndexedRow {
    pub factory_id: String,
    pub ts: NaiveDateTime,
    pub cod: f64,
    pub bod: Option<f64>,
    pub ph: Option<f64>,
    pub tss: Option<f64>,
}

/// Static factory discharge index, strictly sorted by time.
pub struct FactoryIndex {
    rows: Vec<IndexedRow>,
}

impl FactoryIndex {
    /// Build the index from pre-loaded factory rows, dropping BLACKOUT rows
    /// and rows whose timestamp does not parse.
    pub fn from_rows(rows: &[crate::types::FactoryRow], settings: &Settings) -> Self {
        let mut indexed: Vec<IndexedRow> = rows
            .iter()
            .filter_map(|row| {
                let cod = row.cod?;
                let ts = parse_event_time(&row.time, &settings.input_time_format)?;
                Some(IndexedRow {
                    factory_id: row.factory_id.clone(),
                    ts,
                    cod,
                    bod: row.bod,
                    ph: row.ph,
                    tss: row.tss,
                })
            })
            .collect();
        indexed.sort_by(|a, b| a.ts.cmp(&b.ts).then_with(|| a.factory_id.cmp(&b.factory_id)));
        info!("factory index built: {} discharge rows", indexed.len());
        Self { rows: indexed }
    }

    /// Load factory CSVs and build the index in one step.
    pub fn load(
        factory_dir: &std::path::Path,
        settings: &Settings,
    ) -> Result<Self, ingest::IngestError> {
        let rows = ingest::load_factory_rows(factory_dir)?;
        Ok(Self::from_rows(&rows, settings))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows with `ts ∈ [from, to]`, in time order.
    fn window(&self, from: NaiveDateTime, to: NaiveDateTime) -> &[IndexedRow] {
        let lo = self.rows.partition_point(|r| r.ts < from);
        let hi = self.rows.partition_point(|r| r.ts <= to);
        &self.rows[lo..hi]
    }
}

/// Attribution engine binding the index to the configured travel offset.
pub struct Backtracker {
    index: FactoryIndex,
    travel: chrono::Duration,
    tolerance: chrono::Duration,
    time_format: String,
}

impl Backtracker {
    pub fn new(index: FactoryIndex, settings: &Settings) -> Self {
        Self {
            index,
            travel: settings.pipe_travel(),
            tolerance: settings.asof_tolerance(),
            time_format: settings.input_time_format.clone(),
        }
    }

    /// Attribute one shock event, producing its evidence record.
    ///
    /// Returns `None` only when the shock timestamp itself is unparseable —
    /// an empty search window still yields a (null-attributed) record.
    pub fn attribute(&self, shock: &ShockEvent) -> Option<EvidenceRecord> {
        let event_ts = parse_event_time(&shock.time, &self.time_format)?;
        let backtrack_ts = event_ts - self.travel;
        let backtrack_time = backtrack_ts.format(&self.time_format).to_string();

        let window = self
            .index
            .window(backtrack_ts - self.tolerance, backtrack_ts + self.tolerance);
        let matched = select_culprit(window);

        if matched.is_none() {
            debug!(
                cetp_event_time = %shock.time,
                backtrack_time = %backtrack_time,
                "no factory discharge inside the backtrack window"
            );
        }

        Some(EvidenceRecord {
            logged_at: utc_now_iso(),
            cetp_event_time: shock.time.clone(),
            cetp_cod: round2(shock.cod_value),
            breach_mag: round2(shock.breach_mag),
            alert_level: shock.alert_level.clone(),
            backtrack_time,
            attributed_factory: matched.map(|r| r.factory_id.clone()),
            factory_cod: matched.map(|r| round2(r.cod)),
            factory_bod: matched.and_then(|r| r.bod.map(round2)),
            factory_tss: matched.and_then(|r| r.tss.map(round2)),
        })
    }
}

/// Pick the highest-COD row; tie-break latest timestamp, then smallest id.
fn select_culprit(window: &[IndexedRow]) -> Option<&IndexedRow> {
    window.iter().reduce(|best, candidate| {
        let better = candidate.cod > best.cod
            || (candidate.cod == best.cod
                && (candidate.ts > best.ts
                    || (candidate.ts == best.ts && candidate.factory_id < best.factory_id)));
        if better {
            candidate
        } else {
            best
        }
    })
}
