use std::collections::HashMap;

use async_trait::async_trait;
use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::models::{
    ContainerInspectResponse, EndpointSpecModeEnum, EventMessage as BollardEvent, Service,
};
use bollard::network::ListNetworksOptions;
use bollard::service::ListServicesOptions;
use bollard::system::EventsOptions;
use bollard::Docker;
use futures_util::stream::{BoxStream, StreamExt};

use super::error::DaemonError;
use super::model::{
    ContainerDetail, ContainerNetwork, EndpointMode, EventMessage, Filters, NetworkInfo,
    ServerVersion, ServiceInfo, TaskInfo, VirtualIp,
};
use super::raw::RawClient;
use super::DaemonApi;
use crate::types::{ContainerNode, PortBinding, PortMap};

/// Label swarm stamps on containers it schedules.
const SWARM_NODE_LABEL: &str = "com.docker.swarm.node.id";

/// [`DaemonApi`] over a live Docker engine.
pub struct DockerDaemon {
    docker: Docker,
    raw: RawClient,
}

impl DockerDaemon {
    pub(crate) fn new(docker: Docker, raw: RawClient) -> Self {
        Self { docker, raw }
    }
}

#[async_trait]
impl DaemonApi for DockerDaemon {
    async fn server_version(&self) -> Result<ServerVersion, DaemonError> {
        let version = self.docker.version().await?;
        Ok(ServerVersion {
            version: version.version.unwrap_or_default(),
            api_version: version.api_version.unwrap_or_default(),
        })
    }

    async fn list_containers(&self) -> Result<Vec<String>, DaemonError> {
        let opts = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(opts)).await?;
        Ok(containers.into_iter().filter_map(|c| c.id).collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetail, DaemonError> {
        let detail = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await?;
        Ok(container_from_inspect(detail))
    }

    async fn list_services(&self) -> Result<Vec<ServiceInfo>, DaemonError> {
        let services = self
            .docker
            .list_services(None::<ListServicesOptions<String>>)
            .await?;
        Ok(services.into_iter().map(service_from_model).collect())
    }

    async fn list_tasks(&self, filters: &Filters) -> Result<Vec<TaskInfo>, DaemonError> {
        self.raw.list_tasks(filters).await
    }

    async fn list_networks(&self, filters: &Filters) -> Result<Vec<NetworkInfo>, DaemonError> {
        let opts = ListNetworksOptions::<String> {
            filters: filters.clone().into_map(),
        };
        let networks = self.docker.list_networks(Some(opts)).await?;
        Ok(networks
            .into_iter()
            .map(|n| NetworkInfo {
                id: n.id.unwrap_or_default(),
                name: n.name.unwrap_or_default(),
            })
            .collect())
    }

    fn events(&self, filters: Filters) -> BoxStream<'static, Result<EventMessage, DaemonError>> {
        let docker = self.docker.clone();
        async_stream::stream! {
            let opts = EventsOptions::<String> {
                filters: filters.into_map(),
                ..Default::default()
            };
            let mut events = Box::pin(docker.events(Some(opts)));
            while let Some(msg) = events.next().await {
                yield msg.map(event_from_model).map_err(DaemonError::from);
            }
        }
        .boxed()
    }
}

fn container_from_inspect(detail: ContainerInspectResponse) -> ContainerDetail {
    let state = detail.state.unwrap_or_default();
    let health = state
        .health
        .and_then(|h| h.status)
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty());

    let labels = detail.config.and_then(|c| c.labels).unwrap_or_default();
    let node = labels
        .get(SWARM_NODE_LABEL)
        .filter(|id| !id.is_empty())
        .map(|id| ContainerNode { id: id.clone() });

    let settings = detail.network_settings.unwrap_or_default();
    let ports: PortMap = settings
        .ports
        .unwrap_or_default()
        .into_iter()
        .map(|(port, bindings)| {
            let bindings = bindings
                .unwrap_or_default()
                .into_iter()
                .map(|b| PortBinding {
                    host_ip: b.host_ip.unwrap_or_default(),
                    host_port: b.host_port.unwrap_or_default(),
                })
                .collect();
            (port, bindings)
        })
        .collect();
    let networks: HashMap<String, ContainerNetwork> = settings
        .networks
        .unwrap_or_default()
        .into_iter()
        .map(|(name, endpoint)| {
            (
                name,
                ContainerNetwork {
                    network_id: endpoint.network_id.unwrap_or_default(),
                    ip_address: endpoint.ip_address.unwrap_or_default(),
                },
            )
        })
        .collect();

    ContainerDetail {
        id: detail.id.unwrap_or_default(),
        name: detail.name.unwrap_or_default(),
        running: state.running.unwrap_or(false),
        health,
        network_mode: detail
            .host_config
            .and_then(|h| h.network_mode)
            .unwrap_or_default(),
        labels,
        ports,
        networks,
        node,
    }
}

fn service_from_model(service: Service) -> ServiceInfo {
    let spec = service.spec.unwrap_or_default();
    let endpoint_mode = match spec.endpoint_spec.and_then(|e| e.mode) {
        Some(EndpointSpecModeEnum::VIP) => EndpointMode::Vip,
        Some(EndpointSpecModeEnum::DNSRR) => EndpointMode::Dnsrr,
        _ => EndpointMode::Unset,
    };
    let virtual_ips = service
        .endpoint
        .and_then(|e| e.virtual_ips)
        .unwrap_or_default()
        .into_iter()
        .map(|vip| VirtualIp {
            network_id: vip.network_id.unwrap_or_default(),
            addr: vip.addr.unwrap_or_default(),
        })
        .collect();

    ServiceInfo {
        id: service.id.unwrap_or_default(),
        name: spec.name.unwrap_or_default(),
        labels: spec.labels.unwrap_or_default(),
        global: spec.mode.map_or(false, |m| m.global.is_some()),
        endpoint_mode,
        virtual_ips,
    }
}

fn event_from_model(event: BollardEvent) -> EventMessage {
    let actor = event.actor.unwrap_or_default();
    EventMessage {
        kind: event.typ.map(|t| t.to_string()).unwrap_or_default(),
        action: event.action.unwrap_or_default(),
        actor_id: actor.id.unwrap_or_default(),
        attributes: actor.attributes.unwrap_or_default(),
    }
}
