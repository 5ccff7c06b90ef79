//! Diagnostics for the CLI via `RUST_LOG`, written to stderr so stdout stays
//! pure JSON.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Defaults to `warn` when `RUST_LOG` is unset.
///
/// ```bash
/// RUST_LOG=reckon_core=debug reckon assess --context ctx.json
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
