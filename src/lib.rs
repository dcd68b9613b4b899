//! OxideTerm remote filesystem
//!
//! Path-style access to files on SSH hosts over SFTP: address parsing,
//! a registry of live sessions, recursive copy/move/remove across hosts,
//! and the browse and file-action surface used by the explorer.

pub mod config;
pub mod sftp;
pub mod ssh;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{ConfigStorage, StorageError};
use sftp::BrowseSource;
use ssh::ConnectionRegistry;

/// Initialize logging; `RUST_LOG` overrides the default `info` filter.
/// Does nothing if a global subscriber is already installed.
pub fn init_logging() {
    let result = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_err() {
        tracing::debug!("Global tracing subscriber already set");
    }
}

/// Load settings from `storage` and build a browse source over a fresh
/// connection registry
pub async fn open_browse_source(storage: &ConfigStorage) -> Result<BrowseSource, StorageError> {
    let settings = storage.load().await?;
    tracing::info!(
        "Remote filesystem ready (settings {}, timeout {}s)",
        storage.path().display(),
        settings.connect_timeout_secs
    );
    let registry = Arc::new(ConnectionRegistry::with_settings(settings));
    Ok(BrowseSource::new(registry))
}
