//! Logging setup helpers
//!
//! The library itself only emits `tracing` events; binaries and tests choose
//! a subscriber. These helpers install a sensible default.

use tracing_subscriber::EnvFilter;

/// Initialize logging with the default filter (`info`)
///
/// `RUST_LOG` overrides the default. Safe to call more than once; later
/// calls are no-ops.
pub fn init() {
    init_with_filter("info");
}

/// Initialize logging with the given default filter directive
pub fn init_with_filter(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
