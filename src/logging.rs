//! Process-wide logging setup. Library code only emits `tracing` events;
//! the binary installs the subscriber exactly once.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. An explicit `RUST_LOG` wins; otherwise
/// the configured level applies to this crate.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("verity={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
