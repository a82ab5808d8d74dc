//! Reconciliation loop.
//!
//! One background task connects to the daemon, publishes an initial
//! snapshot and, when watching, hands over to the [`Watcher`] running as a
//! supervised child task. Any failure, and any clean end of the event
//! stream, restarts the whole sequence from the connection step after an
//! exponential backoff. The loop only stops on shutdown, when the snapshot
//! receiver goes away, or after the single pass of a non-watching provider.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use log::{debug, error, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::backoff::JobBackoff;
use crate::config::Config;
use crate::discovery::Discovery;
use crate::error::{ConnectionError, ProviderError};
use crate::publish::Publisher;
use crate::runtime::{Connector, DockerConnector};
use crate::types::ConfigMessage;
use crate::watcher::{WatchEnd, Watcher};

/// How one successful attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    /// Published once with watching disabled.
    Done,
    /// The event stream ended; reconnect.
    StreamClosed,
    Cancelled,
}

pub struct Provider<C = DockerConnector> {
    config: Arc<Config>,
    discovery: Discovery,
    connector: C,
}

impl Provider<DockerConnector> {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let connector = DockerConnector::new(config.clone());
        Self::with_connector(config, connector)
    }
}

impl<C: Connector + 'static> Provider<C> {
    pub fn with_connector(config: Arc<Config>, connector: C) -> Self {
        Self {
            discovery: Discovery::from_config(&config),
            config,
            connector,
        }
    }

    /// Start the loop in the background. Snapshots go to `tx`; cancelling
    /// `shutdown` stops the loop and its watcher.
    pub fn provide(
        self,
        tx: mpsc::Sender<ConfigMessage>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let publisher = Publisher::new(tx, self.config.hints());
        tokio::spawn(async move { self.run(publisher, shutdown).await })
    }

    async fn run(self, publisher: Publisher, shutdown: CancellationToken) {
        let mut backoff = JobBackoff::new(&self.config.backoff);

        loop {
            let started = Instant::now();
            let attempt = AssertUnwindSafe(self.operation(&publisher, &shutdown))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(ProviderError::Panicked(panic_message(&*panic))));

            let delay = match attempt {
                Ok(Attempt::Done) => {
                    debug!("Provider finished, watching is disabled");
                    return;
                }
                Ok(Attempt::Cancelled) => break,
                Ok(Attempt::StreamClosed) => {
                    let delay = backoff.next_delay(started.elapsed());
                    info!("Provider event stream closed, reconnecting in {:?}", delay);
                    delay
                }
                Err(e) if !e.is_retriable() => {
                    error!("Provider stopped: {}", e);
                    return;
                }
                Err(e) => {
                    let delay = backoff.next_delay(started.elapsed());
                    error!("Provider connection error {}, retrying in {:?}", e, delay);
                    delay
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }
        info!("Provider shut down");
    }

    /// Connecting → Listing → publish → Watching.
    async fn operation(
        &self,
        publisher: &Publisher,
        shutdown: &CancellationToken,
    ) -> Result<Attempt, ProviderError> {
        if shutdown.is_cancelled() {
            return Ok(Attempt::Cancelled);
        }

        let api = self.connector.connect().map_err(|e| {
            error!("Failed to create a client for docker, error: {}", e);
            e
        })?;

        let version = tokio::select! {
            _ = shutdown.cancelled() => return Ok(Attempt::Cancelled),
            version = api.server_version() => version.map_err(ConnectionError::Handshake)?,
        };
        debug!(
            "Provider connection established with docker {} (API {})",
            version.version, version.api_version
        );

        let records = tokio::select! {
            _ = shutdown.cancelled() => return Ok(Attempt::Cancelled),
            records = self.discovery.enumerate(api.as_ref()) => records.map_err(|e| {
                error!(
                    "Failed to list {} workloads for docker, error {}",
                    self.discovery.mode_name(),
                    e
                );
                ProviderError::Enumeration(e)
            })?,
        };
        info!("Initial enumeration found {} records", records.len());
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(Attempt::Cancelled),
            published = publisher.publish(records) => published?,
        }

        if !self.config.watch {
            return Ok(Attempt::Done);
        }

        // The watcher only starts once the initial snapshot is out, so the
        // two publish sites never overlap.
        let watcher = Watcher::new(
            api,
            self.discovery.clone(),
            publisher.clone(),
            self.config.readiness.clone(),
        );
        let cancel = shutdown.child_token();
        let _stop_watcher = cancel.clone().drop_guard();
        let handle = tokio::spawn(watcher.run(cancel));

        match handle.await {
            Ok(Ok(WatchEnd::StreamClosed)) => Ok(Attempt::StreamClosed),
            Ok(Ok(WatchEnd::Cancelled)) => Ok(Attempt::Cancelled),
            Ok(Err(e)) => Err(e),
            Err(e) if e.is_panic() => Err(ProviderError::Panicked(panic_message(&*e.into_panic()))),
            Err(e) => Err(ProviderError::Panicked(e.to_string())),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
