//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Install the global fmt subscriber, filtered by `RUST_LOG` (default `info`).
///
/// Returns `false` when a subscriber was already installed, so calling this
/// more than once is harmless.
pub fn init_logging() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}
