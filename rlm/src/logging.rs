//! Diagnostic tracing for the launcher.
//!
//! Only the launcher's own events go through here. Engine output is either
//! inherited by the terminal or captured for error messages, and the engine
//! writes its run logs under `logs/` itself.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `warn` if unset.
/// Output: stderr, compact format, so stdout stays clean for results.
///
/// # Example
/// ```bash
/// RUST_LOG=rlm=debug rlm run "What is 2+2?"
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
