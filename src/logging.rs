//! Logging setup for the handler binaries
//!
//! Diagnostics go to stderr so the invoking desktop shell can capture them;
//! the exit code remains the only machine-readable result.

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber.
///
/// Log level defaults to INFO (DEBUG with `verbose`) and can be overridden
/// via the `RUST_LOG` environment variable.
pub fn init(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}
