//! Tracing setup for embedding hosts. Logs go to stderr so machine-readable
//! output on stdout stays clean.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global subscriber once; later calls are no-ops.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
