//! Tracing subscriber setup for the `envsync` binary.

use tracing_subscriber::EnvFilter;

/// Pick the log filter: `RUST_LOG` wins, then `--verbose`, then the
/// configured level.
pub fn filter(verbose: bool, configured: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(configured).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber, writing to stderr so stdout carries only
/// command output.
pub fn init(verbose: bool, configured: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(verbose, configured))
        .with_writer(std::io::stderr)
        .init();
}
