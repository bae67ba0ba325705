//! Tracing subscriber setup shared by the services

use tracing_subscriber::{EnvFilter, fmt};

/// Install the global fmt subscriber
///
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
