//! Development-time tracing for debugging ghost.
//!
//! Tracing is a developer diagnostic enabled through `RUST_LOG` and written to stderr.
//! What the user sees (commands, output panels, the final answer) goes through
//! [`crate::display`] on stdout and is unaffected by the filter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`; defaults to `warn` if unset or unparsable.
///
/// # Example
/// ```bash
/// RUST_LOG=ghost=debug ghost "how much disk space is free"
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
