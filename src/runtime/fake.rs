//! In-memory daemon for deterministic tests.
//!
//! Holds canned containers, services, tasks and networks behind a mutex so a
//! test can mutate daemon state while discovery runs. Events are scripted
//! through an unbounded channel; dropping the sender ends the stream cleanly.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;

use super::error::DaemonError;
use super::model::{
    ContainerDetail, EventMessage, Filters, NetworkInfo, ServerVersion, ServiceInfo, TaskInfo,
    TaskState,
};
use super::{Connector, DaemonApi};
use crate::error::ConnectionError;

#[derive(Default)]
struct Inner {
    version: ServerVersion,
    version_fails: bool,
    containers: Vec<ContainerDetail>,
    broken_inspect: HashSet<String>,
    services: Vec<ServiceInfo>,
    tasks: Vec<TaskInfo>,
    broken_task_services: HashSet<String>,
    networks: Vec<NetworkInfo>,
    network_filters: Vec<Filters>,
    task_queries: HashMap<String, usize>,
    event_filters: Vec<Filters>,
    events: Option<mpsc::UnboundedReceiver<Result<EventMessage, DaemonError>>>,
}

pub(crate) struct FakeDaemon {
    inner: Mutex<Inner>,
}

impl FakeDaemon {
    pub(crate) fn new(api_version: &str) -> Self {
        let inner = Inner {
            version: ServerVersion {
                version: "24.0.7".into(),
                api_version: api_version.into(),
            },
            ..Default::default()
        };
        Self {
            inner: Mutex::new(inner),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.inner.lock().unwrap();
        f(&mut inner)
    }

    pub(crate) fn fail_version(&self) {
        self.with(|s| s.version_fails = true);
    }

    pub(crate) fn add_container(&self, container: ContainerDetail) {
        self.with(|s| s.containers.push(container));
    }

    pub(crate) fn remove_container(&self, id: &str) {
        self.with(|s| s.containers.retain(|c| c.id != id));
    }

    pub(crate) fn break_inspect(&self, id: &str) {
        self.with(|s| s.broken_inspect.insert(id.to_string()));
    }

    pub(crate) fn add_service(&self, service: ServiceInfo) {
        self.with(|s| s.services.push(service));
    }

    pub(crate) fn add_task(&self, task: TaskInfo) {
        self.with(|s| s.tasks.push(task));
    }

    pub(crate) fn set_task_state(&self, task_id: &str, state: TaskState) {
        self.with(|s| {
            for task in s.tasks.iter_mut().filter(|t| t.id == task_id) {
                task.state = state;
            }
        });
    }

    pub(crate) fn break_tasks_for(&self, service_id: &str) {
        self.with(|s| s.broken_task_services.insert(service_id.to_string()));
    }

    pub(crate) fn add_network(&self, id: &str, name: &str) {
        self.with(|s| {
            s.networks.push(NetworkInfo {
                id: id.into(),
                name: name.into(),
            })
        });
    }

    /// Filters passed to every `list_networks` call, in order.
    pub(crate) fn network_filters(&self) -> Vec<Filters> {
        self.with(|s| s.network_filters.clone())
    }

    /// Filters passed to every `events` subscription, in order.
    pub(crate) fn event_filters(&self) -> Vec<Filters> {
        self.with(|s| s.event_filters.clone())
    }

    /// Number of `list_tasks` calls scoped to `service_id`.
    pub(crate) fn task_queries(&self, service_id: &str) -> usize {
        self.with(|s| s.task_queries.get(service_id).copied().unwrap_or(0))
    }

    /// Script the next event subscription.
    pub(crate) fn event_feed(&self) -> mpsc::UnboundedSender<Result<EventMessage, DaemonError>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.with(|s| s.events = Some(rx));
        tx
    }
}

#[async_trait]
impl DaemonApi for FakeDaemon {
    async fn server_version(&self) -> Result<ServerVersion, DaemonError> {
        self.with(|s| {
            if s.version_fails {
                Err(DaemonError::Other("version unavailable".into()))
            } else {
                Ok(s.version.clone())
            }
        })
    }

    async fn list_containers(&self) -> Result<Vec<String>, DaemonError> {
        Ok(self.with(|s| s.containers.iter().map(|c| c.id.clone()).collect()))
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetail, DaemonError> {
        self.with(|s| {
            if s.broken_inspect.contains(id) {
                return Err(DaemonError::Other(format!("no such container: {id}")));
            }
            s.containers
                .iter()
                .find(|c| c.id == id)
                .cloned()
                .ok_or_else(|| DaemonError::Other(format!("no such container: {id}")))
        })
    }

    async fn list_services(&self) -> Result<Vec<ServiceInfo>, DaemonError> {
        Ok(self.with(|s| s.services.clone()))
    }

    async fn list_tasks(&self, filters: &Filters) -> Result<Vec<TaskInfo>, DaemonError> {
        self.with(|s| {
            for service in filters.get("service").unwrap_or_default() {
                *s.task_queries.entry(service.clone()).or_default() += 1;
                if s.broken_task_services.contains(service) {
                    return Err(DaemonError::Other(format!("task list failed for {service}")));
                }
            }
            Ok(s.tasks
                .iter()
                .filter(|t| filters.accepts("service", &t.service_id))
                .filter(|t| filters.accepts("desired-state", t.desired_state.as_str()))
                .cloned()
                .collect())
        })
    }

    async fn list_networks(&self, filters: &Filters) -> Result<Vec<NetworkInfo>, DaemonError> {
        Ok(self.with(|s| {
            s.network_filters.push(filters.clone());
            s.networks.clone()
        }))
    }

    fn events(&self, filters: Filters) -> BoxStream<'static, Result<EventMessage, DaemonError>> {
        let feed = self.with(|s| {
            s.event_filters.push(filters);
            s.events.take()
        });
        match feed {
            Some(rx) => stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|msg| (msg, rx))
            })
            .boxed(),
            None => stream::pending().boxed(),
        }
    }
}

/// Hands out the same fake daemon, failing the first `failures` attempts.
pub(crate) struct FakeConnector {
    daemon: Arc<FakeDaemon>,
    failures: AtomicUsize,
    attempts: AtomicUsize,
}

impl FakeConnector {
    pub(crate) fn new(daemon: Arc<FakeDaemon>) -> Self {
        Self::failing(daemon, 0)
    }

    pub(crate) fn failing(daemon: Arc<FakeDaemon>, failures: usize) -> Self {
        Self {
            daemon,
            failures: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
        }
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Connector for FakeConnector {
    fn connect(&self) -> Result<Arc<dyn DaemonApi>, ConnectionError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ConnectionError::InvalidEndpoint {
                endpoint: "unix:///fake.sock".into(),
                reason: "daemon unavailable".into(),
            });
        }
        Ok(self.daemon.clone())
    }
}
