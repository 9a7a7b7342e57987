//! Application setup and initialization
//!
//! All initialization logic lives here instead of main.rs so tests can build
//! the application against their own stores and storage backends.

pub mod database;
pub mod routes;
pub mod server;

use crate::state::AppState;
use anyhow::{Context, Result};
use depot_core::Config;
use depot_db::{MemoryUploadStore, PgUploadStore, UploadStore};
use depot_services::{CleanupService, ProviderRegistry, UploadConfig, UploadService};
use std::sync::Arc;
use std::time::Duration;

/// Initialize structured logging from RUST_LOG (default `info`).
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}

/// Initialize the entire application: store, providers, services, routes.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    let store: Arc<dyn UploadStore> = if config.database_url.is_some() {
        let pool = database::setup_database(&config).await?;
        Arc::new(PgUploadStore::new(pool))
    } else {
        tracing::warn!(
            "DATABASE_URL not set; using the in-memory upload store. \
             Sessions will not survive a restart."
        );
        Arc::new(MemoryUploadStore::new())
    };

    let providers = Arc::new(
        ProviderRegistry::from_config(&config).context("Storage provider configuration failed")?,
    );

    let upload = Arc::new(UploadService::new(
        store.clone(),
        providers.clone(),
        UploadConfig::from_config(&config),
    ));

    if config.cleanup_interval_secs > 0 {
        let cleanup = Arc::new(CleanupService::new(
            store,
            providers,
            Duration::from_secs(config.cleanup_interval_secs),
        ));
        cleanup.start();
    }

    let state = Arc::new(AppState {
        upload,
        config: config.clone(),
    });

    let router = routes::build_router(state.clone(), &config)?;

    Ok((state, router))
}
