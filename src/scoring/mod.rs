//! Anomaly scoring chain for the factory path.
//!
//! `zscore` joins each reading with its sensor's rolling window statistics;
//! `persistence` gates on consecutive-anomaly streaks; `multivariate`
//! synchronizes confirmed anomalies per discharge-point group and computes
//! the RMS composite; `attribution` explains each group row by z² share.

pub mod attribution;
pub mod multivariate;
pub mod persistence;
pub mod zscore;

pub use attribution::format_alert;
pub use multivariate::GroupAggregator;
pub use persistence::PersistenceGate;
pub use zscore::ZScorer;
