/*!
Logging and profiling setup.

With the `profiling` feature the `profiling` shim forwards its scopes to
`tracing` spans, so `RUST_LOG=trace` shows the per-fix pipeline timings.
Without it, scopes compile to nothing and this only installs the fmt layer.
*/

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize logging with sensible defaults when `RUST_LOG` is unset
pub fn setup_logging_and_profiling() {
    let default_filter = if cfg!(debug_assertions) {
        "debug,coverage_nav_lib::matcher=info,coverage_nav_lib::smoother=info"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let fmt_layer = fmt::layer().with_target(cfg!(debug_assertions)).with_filter(filter);
    let registry = tracing_subscriber::registry().with(fmt_layer);
    if registry.try_init().is_err() {
        tracing::debug!("Logging was already initialized");
        return;
    }

    if cfg!(feature = "profiling") {
        tracing::info!("Logging initialized (profiling scopes forwarded to tracing)");
    } else {
        tracing::info!("Logging initialized (profiling disabled in this build)");
    }
}
