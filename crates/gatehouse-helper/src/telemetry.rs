//! Logging bootstrap for helper processes.
//!
//! Library code only emits `tracing` events; installing a subscriber is the
//! host's call, made once from `main` before the runtime starts.

use tracing_subscriber::EnvFilter;

/// Environment variable controlling the helper's log filter.
pub const LOG_FILTER_ENV: &str = "GATEHOUSE_LOG";

/// Install a process-wide `tracing` subscriber reading its filter from
/// [`LOG_FILTER_ENV`] (default `info`). Safe to call more than once; later
/// calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(filter_env = LOG_FILTER_ENV, "logging initialized");
    }
}
