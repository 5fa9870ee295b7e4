//! Logging initializer. Not installed implicitly — callers (a binary, a test
//! harness) opt in explicitly.

use tracing_subscriber::EnvFilter;

/// Install a `tracing_subscriber::fmt` subscriber honoring `RUST_LOG`,
/// defaulting to `info`. Safe to call more than once; subsequent calls are
/// no-ops if a global subscriber is already installed.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
