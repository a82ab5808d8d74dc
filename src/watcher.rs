//! Event watcher.
//!
//! Subscribes to the daemon event stream and re-enumerates on relevant
//! events. In swarm mode a service event usually arrives before the
//! service's tasks have started, so the watcher holds off until every
//! running-desired task has left the starting states, bounded by the
//! readiness policy.

use std::sync::Arc;

use futures_util::stream::StreamExt;
use log::{debug, error, info, warn};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::config::ReadinessConfig;
use crate::discovery::service::running_tasks_filter;
use crate::discovery::Discovery;
use crate::error::ProviderError;
use crate::publish::Publisher;
use crate::runtime::{DaemonApi, EventMessage};

/// How a watch ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEnd {
    /// The daemon closed the event stream.
    StreamClosed,
    Cancelled,
}

/// Outcome of the swarm readiness gate for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// Task listing failed; reconcile with whatever the daemon reports.
    Unknown,
    /// Tasks were still starting after the last allowed attempt.
    GaveUp,
}

pub struct Watcher {
    api: Arc<dyn DaemonApi>,
    discovery: Discovery,
    publisher: Publisher,
    readiness: ReadinessConfig,
}

impl Watcher {
    pub fn new(
        api: Arc<dyn DaemonApi>,
        discovery: Discovery,
        publisher: Publisher,
        readiness: ReadinessConfig,
    ) -> Self {
        Self {
            api,
            discovery,
            publisher,
            readiness,
        }
    }

    /// Process events until the stream ends, fails, or `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> Result<WatchEnd, ProviderError> {
        let mut events = self.api.events(self.discovery.event_filters());
        info!("Listening for Docker events ({} mode)", self.discovery.mode_name());

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Ok(WatchEnd::Cancelled),
                next = events.next() => next,
            };
            let event = match next {
                None => {
                    debug!("Provider event stream closed");
                    return Ok(WatchEnd::StreamClosed);
                }
                Some(Err(e)) => return Err(ProviderError::Stream(e)),
                Some(Ok(event)) => event,
            };

            tokio::select! {
                _ = cancel.cancelled() => return Ok(WatchEnd::Cancelled),
                handled = self.handle(event) => handled?,
            }
        }
    }

    async fn handle(&self, event: EventMessage) -> Result<(), ProviderError> {
        match &self.discovery {
            Discovery::Standalone => {
                if !triggers_refresh(&event.action) {
                    return Ok(());
                }
                debug!("Provider event received {:?}", event);
                let records = self.discovery.enumerate(self.api.as_ref()).await.map_err(|e| {
                    error!("Failed to list containers for docker, error {}", e);
                    ProviderError::Enumeration(e)
                })?;
                self.publisher.publish(records).await
            }
            Discovery::Swarm { .. } => {
                debug!("Docker events callback executed with payload: {:?}", event);
                if !event.actor_id.is_empty()
                    && self.await_tasks(&event.actor_id).await == Readiness::GaveUp
                {
                    warn!(
                        "Tasks of service {} did not converge, reconciling with current state",
                        event.actor_id
                    );
                }
                self.list_and_update_services().await
            }
        }
    }

    /// Poll the service's running-desired tasks until none is still starting.
    pub async fn await_tasks(&self, service_id: &str) -> Readiness {
        let filters = running_tasks_filter(service_id);
        let mut attempt: u32 = 0;
        loop {
            let tasks = match self.api.list_tasks(&filters).await {
                Ok(tasks) => tasks,
                Err(e) => {
                    error!("Failed to list tasks for service {}, error {}", service_id, e);
                    return Readiness::Unknown;
                }
            };
            for task in &tasks {
                debug!("State of task {}: {}", task.id, task.state);
            }
            let pending = tasks.is_empty() || tasks.iter().any(|t| t.state.is_starting());
            if !pending {
                debug!("Callback task state check: Won't retry");
                return Readiness::Ready;
            }

            attempt += 1;
            if self.readiness.max_attempts.is_some_and(|max| attempt >= max) {
                return Readiness::GaveUp;
            }
            debug!(
                "Callback task state check: Retrying in {:?}",
                self.readiness.retry_delay()
            );
            sleep(self.readiness.retry_delay()).await;
        }
    }

    async fn list_and_update_services(&self) -> Result<(), ProviderError> {
        match self.discovery.enumerate(self.api.as_ref()).await {
            Ok(records) => {
                debug!("Services found! {:?}", records);
                self.publisher.publish(records).await
            }
            Err(e) => {
                error!("Failed to list services for docker, error {}", e);
                Ok(())
            }
        }
    }
}

/// Container actions that change what is routable.
fn triggers_refresh(action: &str) -> bool {
    action == "start" || action == "die" || action.starts_with("health_status")
}
