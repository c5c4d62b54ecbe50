//! Logging initialization.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber: `RUST_LOG` when set, otherwise a
/// sensible per-crate default, with the compact fmt layer.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("obsdb_server=info,obsdb_store=info,obsdb_ingest=info,obsdb_query=info")
    });

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact());

    let _ = tracing::dispatcher::set_global_default(tracing::Dispatch::new(subscriber));
}
