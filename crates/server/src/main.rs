//! Sentiloop Server - Main Entry Point
//!
//! Loads the initial model, starts the batch consumer and the artifact
//! change watcher, then serves until interrupted. The transport layer in
//! front of `SentimentService::predict` is deployment-specific and not
//! part of this binary.

use sentiloop_common::ServiceConfig;
use sentiloop_server::{LexiconLoader, SentimentService};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentiloop_server=info,sentiloop_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Sentiloop Server");

    // Load configuration; without a config file, defaults plus env
    // overrides apply
    let mut config = match std::env::var("SENTILOOP_CONFIG") {
        Ok(path) => ServiceConfig::from_file(path)?,
        Err(_) => ServiceConfig::default(),
    };
    config.apply_env_overrides();
    config.validate()?;

    info!(
        "Configuration loaded: baseline={}, artifact_dir={}, batch_size={}, max_latency={}ms",
        config.model.baseline_id,
        config.model.artifact_dir.display(),
        config.batching.max_batch_size,
        config.batching.max_latency_ms
    );

    let service = SentimentService::start(config, Box::new(LexiconLoader::new())).await?;

    // Wait for shutdown signal
    signal::ctrl_c().await?;
    info!("Received shutdown signal");

    service.shutdown().await;
    info!("Sentiloop Server shutdown complete");
    Ok(())
}
