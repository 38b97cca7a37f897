//! Tracing subscriber setup.
//!
//! `debug = true` in the `[api]` section turns on verbose request logging
//! for this crate; `RUST_LOG` always wins when set.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ApiSettings;

/// Builds the filter used by [`init_tracing`].
pub fn env_filter(api: &ApiSettings) -> EnvFilter {
    let default_level = if api.debug { "debug" } else { "info" };
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("loyaltydog_client={default_level},loyaltydog_core={default_level},warn")))
}

/// Installs the global fmt subscriber. Safe to call more than once; later
/// calls are ignored.
pub fn init_tracing(api: &ApiSettings) {
    let subscriber = fmt()
        .with_env_filter(env_filter(api))
        .with_target(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
