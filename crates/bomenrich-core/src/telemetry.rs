//! Tracing setup shared by every binary in the workspace, grounded on
//! `add-ons/bomenrich-gateway`'s predecessor pattern of a `tracing_subscriber`
//! registry layered with an `EnvFilter` and an `fmt` layer.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs a global `tracing` subscriber. `RUST_LOG` controls verbosity,
/// defaulting to `info`. Call once, at process start.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
