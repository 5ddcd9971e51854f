//! Tracing setup for binaries and agent hosts embedding the store.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the process-wide tracing subscriber.
///
/// Output is compact text by default; pass `json = true` for
/// newline-delimited JSON suitable for log pipelines. The `RUST_LOG`
/// environment variable overrides `default_level` when set.
///
/// Calling this more than once is harmless: only the first call wins,
/// since the global subscriber is set once per process.
pub fn init_tracing(json: bool, default_level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        registry
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}
