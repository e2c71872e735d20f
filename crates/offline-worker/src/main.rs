//! Offline Worker - network-first asset cache in front of a web origin
//!
//! Precaches the configured static assets, then proxies every request to the
//! origin, serving cached copies while the origin is unreachable.

use offline_cache::CacheStorage;
use offline_worker::{
    start_server, Config, HttpNetwork, Result, ServerState, ServiceWorker, SharedState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive("offline_worker=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting offline worker...");

    let config = Config::from_env()?;
    info!("Port: {}", config.port);
    info!("Origin: {}", config.origin);
    info!("Cache dir: {:?}", config.cache_dir);
    info!("Cache name: {}", config.cache_name);
    info!("Static assets: {:?}", config.static_assets);

    let storage = Arc::new(CacheStorage::new(config.cache_dir.clone()));
    storage.init().await?;

    let network = Arc::new(HttpNetwork::new(Duration::from_secs(
        config.network_timeout_secs,
    ))?);

    let worker = Arc::new(ServiceWorker::new(config.worker_config(), storage, network));

    // Nothing is served until install settles; a failed install discards
    // this worker version.
    if let Err(e) = ServiceWorker::dispatch_install(&worker).await? {
        error!(error = %e, "Install failed, exiting");
        return Err(e);
    }

    let state: SharedState = Arc::new(ServerState::new(worker));

    // Start HTTP server (blocking)
    start_server(state, config.port).await?;

    Ok(())
}
