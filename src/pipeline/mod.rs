//! Processing Pipeline Module
//!
//! The engine is a dataflow of stages; each path owns its stage chain and
//! is driven by one [`processing_loop`] over one source:
//!
//! ```text
//! CETP CSV    → validator → tripwire → backtrack ─→ evidence JSONL
//! factory CSV → validator → windowed stats → z-score → persistence
//!             → multivariate → attribution → ERI → alert router
//!                                                ─→ alerts JSONL
//! (rejects from both paths)                      ─→ quarantine JSONL
//! (metrics taps from both paths)                 ─→ metrics snapshot
//! ```
//!
//! Per-key event order is guaranteed by construction: one loop per source,
//! rows processed strictly sequentially. Shared state is limited to the
//! quarantine sink and the metrics hub, each behind its own mutex.

mod cetp;
mod factory;
mod metrics_hub;
pub mod processing_loop;

pub use cetp::CetpPipeline;
pub use factory::FactoryPipeline;
pub use metrics_hub::MetricsHub;
pub use processing_loop::{run as run_loop, StreamStage};
