//! Standalone engine discovery: one record per running container.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::runtime::{ContainerDetail, DaemonApi, DaemonError};
use crate::types::{DiscoveryRecord, NetworkEndpoint, NetworkSettings};

/// List every container and keep the ones that are running.
///
/// Fails only when the listing itself fails; a container that cannot be
/// inspected is skipped.
pub async fn list_containers(api: &dyn DaemonApi) -> Result<Vec<DiscoveryRecord>, DaemonError> {
    let ids = api.list_containers().await?;

    let mut records = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(record) = inspect_container(api, &id).await {
            records.push(record);
        }
    }
    Ok(records)
}

async fn inspect_container(api: &dyn DaemonApi, id: &str) -> Option<DiscoveryRecord> {
    let detail = match api.inspect_container(id).await {
        Ok(detail) => detail,
        Err(e) => {
            warn!("Failed to inspect container {}, error: {}", id, e);
            return None;
        }
    };
    // A container that is not running has no usable address.
    if !detail.running {
        debug!("Skipping container {}: not running", id);
        return None;
    }
    let record = parse_container(detail);
    if record.name.is_empty() {
        warn!("Skipping container {}: daemon reported no name", id);
        return None;
    }
    Some(record)
}

pub fn parse_container(container: ContainerDetail) -> DiscoveryRecord {
    let name = container.name.trim_start_matches('/').to_string();
    let networks: BTreeMap<String, NetworkEndpoint> = container
        .networks
        .into_iter()
        .map(|(net_name, net)| {
            let endpoint = NetworkEndpoint {
                name: net_name.clone(),
                addr: net.ip_address,
                id: net.network_id,
                ..Default::default()
            };
            (net_name, endpoint)
        })
        .collect();

    DiscoveryRecord {
        service_name: name.clone(),
        name,
        labels: container.labels.into_iter().collect(),
        network_settings: NetworkSettings {
            network_mode: container.network_mode,
            ports: container.ports,
            networks,
        },
        health: container.health,
        node: container.node,
    }
}
