// src/lib.rs
// Public library surface for the service binary, the CLI and integration tests.

pub mod aggregate;
pub mod api;
pub mod browser;
pub mod cache;
pub mod client;
pub mod config;
pub mod extract;
pub mod listing;
pub mod metrics;
pub mod pool;
pub mod sources;
pub mod telemetry;
pub mod verify;

pub use crate::api::router;
pub use crate::listing::{Listing, Query};

use std::sync::Arc;

use axum::Router;
use tracing::info;

use crate::api::AppState;
use crate::browser::{BrowserLauncher, ChromeLauncher};
use crate::config::AppConfig;
use crate::sources::SourceRegistry;

/// Build the full service from `config/avdeals.toml` (or `$AVDEALS_CONFIG_PATH`)
/// with a real Chromium launcher.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = AppConfig::load_default()?;
    let launcher = ChromeLauncher::new(
        cfg.chrome_executable.clone(),
        cfg.headless,
        cfg.navigation_timeout(),
    );
    build_app(&cfg, Arc::new(launcher))
}

/// Assemble the router around any launcher. Must run inside a Tokio runtime
/// (periodic cache clears are spawned here).
pub fn build_app(cfg: &AppConfig, launcher: Arc<dyn BrowserLauncher>) -> anyhow::Result<Router> {
    let metrics = crate::metrics::Metrics::init(cfg.cache_clear_secs)?;
    let registry = SourceRegistry::from_config(cfg, launcher)?;
    info!(sources = ?registry.names(), clear_secs = cfg.cache_clear_secs, "sources registered");

    let state = AppState::new(registry);
    Ok(router(state).merge(metrics.router()))
}
