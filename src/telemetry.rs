//! Logging and error-report setup for binaries and tests embedding the repository

use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "kv_repository=info";

/// Install a `tracing` fmt subscriber filtered by `RUST_LOG`.
///
/// Fails if a global subscriber is already set.
pub fn try_init_tracing() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| Error::Configuration {
            message: format!("Failed to install tracing subscriber: {}", e),
        })
}

/// Like [`try_init_tracing`], but a second call is a no-op.
pub fn init_tracing() {
    if try_init_tracing().is_err() {
        tracing::trace!("tracing subscriber already installed");
    }
}

/// Install `color-eyre` panic and error report hooks.
pub fn install_error_reports() -> Result<()> {
    color_eyre::install().map_err(|e| Error::Configuration {
        message: format!("Failed to install error report hooks: {}", e),
    })
}
