//! Development-time tracing for debugging the harness.
//!
//! Operator-facing narration (iteration banners, event echoes) goes to stdout
//! via `println!` and is part of the product. Tracing here is dev diagnostics
//! only: `RUST_LOG`-controlled, stderr, not persisted.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG`. Defaults to `warn` if unset. Output: stderr, compact
/// format.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
