//! Pipeline Configuration Module
//!
//! All tunables are read once at startup from `RIVERGUARD_*` environment
//! variables with typed defaults, validated, then frozen behind a global
//! accessor. There is no live reconfiguration.
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! // In main():
//! let settings = Settings::from_env()?;
//! config::init(settings);
//!
//! // Anywhere in the codebase:
//! let threshold = config::get().zscore_threshold;
//! ```

pub mod defaults;
mod settings;
pub mod validation;

pub use settings::{ConfigError, SensorGroup, Settings, ValueRange};
pub use validation::{validate, ValidationWarning};

use std::sync::OnceLock;

/// Global pipeline settings, initialized once at startup.
static SETTINGS: OnceLock<Settings> = OnceLock::new();

/// Initialize the global settings.
///
/// Must be called exactly once before any calls to `get()`. A second call
/// is ignored with a warning (safe for parallel tests).
pub fn init(settings: Settings) {
    if SETTINGS.set(settings).is_err() {
        tracing::warn!("config::init() called more than once — ignoring");
    }
}

/// Get a reference to the global settings.
///
/// Panics if `init()` has not been called — a missing config is a startup
/// bug, not a recoverable condition.
pub fn get() -> &'static Settings {
    #[allow(clippy::expect_used)]
    let settings = SETTINGS
        .get()
        .expect("config::get() called before config::init() — this is a startup bug");
    settings
}

/// Check whether the config has been initialized.
///
/// Useful for tests and optional config paths.
pub fn is_initialized() -> bool {
    SETTINGS.get().is_some()
}
