use async_trait::async_trait;
use futures_util::stream::BoxStream;

pub mod client;
pub mod docker;
pub mod error;
pub mod model;
mod raw;
mod tls;
pub mod version;

#[cfg(test)]
pub(crate) mod fake;

pub use client::{DockerConnector, Endpoint, DOCKER_API_VERSION, SWARM_API_VERSION};
pub use docker::DockerDaemon;
pub use error::DaemonError;
pub use model::{
    ContainerDetail, EndpointMode, EventMessage, Filters, NetworkAttachment, NetworkInfo,
    ServerVersion, ServiceInfo, TaskInfo, TaskState, VirtualIp,
};
pub use version::{ApiVersion, ProtocolVersion};

/// Read-only view of a container daemon used by discovery.
///
/// The live implementation talks to Docker; tests substitute an in-memory
/// double. Every method is a single daemon round trip.
#[async_trait]
pub trait DaemonApi: Send + Sync {
    async fn server_version(&self) -> Result<ServerVersion, DaemonError>;

    /// IDs of the containers the daemon currently reports as running.
    async fn list_containers(&self) -> Result<Vec<String>, DaemonError>;

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetail, DaemonError>;

    async fn list_services(&self) -> Result<Vec<ServiceInfo>, DaemonError>;

    async fn list_tasks(&self, filters: &Filters) -> Result<Vec<TaskInfo>, DaemonError>;

    async fn list_networks(&self, filters: &Filters) -> Result<Vec<NetworkInfo>, DaemonError>;

    /// Subscribe to the daemon event stream. The stream ends (`None`) when
    /// the daemon closes the connection cleanly.
    fn events(&self, filters: Filters) -> BoxStream<'static, Result<EventMessage, DaemonError>>;
}

/// Produces a fresh daemon handle for each connection attempt.
pub trait Connector: Send + Sync {
    fn connect(&self) -> Result<std::sync::Arc<dyn DaemonApi>, crate::error::ConnectionError>;
}

impl<T: Connector + ?Sized> Connector for std::sync::Arc<T> {
    fn connect(&self) -> Result<std::sync::Arc<dyn DaemonApi>, crate::error::ConnectionError> {
        (**self).connect()
    }
}
