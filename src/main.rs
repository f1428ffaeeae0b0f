use std::sync::Arc;

use session_authority::domain::KeyValueStore;
use session_authority::services::data_stores::{RedisService, StoreSessionRegistry};
use session_authority::services::{AuditLog, CleanupSweeper};
use session_authority::utils::Config;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = Config::from_env().expect("Failed to load config");
    let Some(host) = config.redis_host() else {
        error!("REDIS_HOST is required to run the sweeper");
        std::process::exit(1);
    };

    let store: Arc<dyn KeyValueStore> = Arc::new(
        RedisService::new(host, config.store_timeout()).expect("Failed to create redis client"),
    );
    let registry = Arc::new(StoreSessionRegistry::new(
        store,
        AuditLog::new(),
        config.scan_batch_size(),
    ));

    info!(host, "starting session sweeper");
    let handle = CleanupSweeper::new(registry, config.sweep_interval()).start();

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
    handle.stop().await;
    info!("session sweeper stopped");
}
