//! docksync daemon entry point.

use log::{debug, error, info};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use docksync::{Config, ConfigMessage, Provider};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    // Load configuration
    let cfg = Config::load()?;
    info!("Starting docksync with config: {:?}", cfg);

    // Snapshot channel
    let (tx, mut rx) = mpsc::channel::<ConfigMessage>(cfg.channel_capacity);
    let shutdown = CancellationToken::new();

    // Discovery provider
    let mut provider_handle = Provider::new(cfg).provide(tx, shutdown.clone());

    // Snapshot consumer
    let consumer_handle = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            info!(
                "Received {} records from provider {}",
                message.records.len(),
                message.provider_name
            );
            match serde_json::to_string_pretty(&message) {
                Ok(json) => debug!("{}", json),
                Err(e) => error!("Failed to serialize snapshot: {}", e),
            }
        }
    });

    // Graceful Shutdown, or the provider ending on its own when not watching
    tokio::select! {
        res = signal::ctrl_c() => {
            match res {
                Ok(()) => info!("Received Ctrl+C, shutting down..."),
                Err(err) => error!("Unable to listen for shutdown signal: {}", err),
            }
            shutdown.cancel();
            if let Err(e) = (&mut provider_handle).await {
                error!("Provider task failed: {}", e);
            }
        }
        res = &mut provider_handle => {
            if let Err(e) = res {
                error!("Provider task failed: {}", e);
            }
        }
    }
    // The provider owned the sender, so the consumer drains and exits.
    if let Err(e) = consumer_handle.await {
        error!("Snapshot consumer failed: {}", e);
    }

    info!("Shutdown complete.");
    Ok(())
}
