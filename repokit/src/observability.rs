//! Structured logging

use std::sync::Once;

use tracing_subscriber::EnvFilter;

use crate::config::Config;

static INIT: Once = Once::new();

/// Install a JSON `tracing` subscriber filtered by `service.log_level`
///
/// `RUST_LOG` is not consulted; an unparsable level falls back to `info`.
/// Calling this more than once, or after another subscriber was installed,
/// leaves the existing subscriber in place.
pub fn init_tracing(config: &Config) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_new(&config.service.log_level)
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let installed = tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
            .is_ok();

        if installed {
            tracing::info!(
                service = %config.service.name,
                environment = %config.service.environment,
                "Tracing initialized"
            );
        }
    });
}

/// Log tracing shutdown
pub fn shutdown_tracing() {
    tracing::info!("Tracing shutdown complete");
}
