//! Swarm discovery: service VIP records or one record per running task.

use log::{debug, warn};

use super::network::{resolve_attachments, resolve_virtual_ips, NetworkMap};
use crate::runtime::{
    DaemonApi, DaemonError, EndpointMode, Filters, ServiceInfo, TaskInfo, TaskState,
};
use crate::types::{DiscoveryRecord, NetworkSettings};

/// Filter for the running tasks of one service.
pub fn running_tasks_filter(service_id: &str) -> Filters {
    Filters::new()
        .arg("service", service_id)
        .arg("desired-state", "running")
}

/// Enumerate every swarm service.
///
/// `lb_label` is the service label that opts a service into swarm's own
/// VIP load balancing; such services yield a single record. All others are
/// enumerated task by task. A task listing failure only drops that service.
pub async fn list_services(
    api: &dyn DaemonApi,
    lb_label: &str,
) -> Result<Vec<DiscoveryRecord>, DaemonError> {
    let services = api.list_services().await?;
    debug!("Service list: {:?}", services);

    let version = api.server_version().await?;
    let networks = NetworkMap::fetch(api, &version.api_version).await?;
    debug!(
        "Resolved {} swarm networks (API {})",
        networks.len(),
        version.api_version
    );

    let mut records = Vec::new();
    for service in &services {
        let record = parse_service(service, &networks);

        if wants_swarm_lb(service, lb_label) {
            match service.endpoint_mode {
                EndpointMode::Dnsrr => warn!(
                    "Ignored {} endpoint-mode not supported, service name: {}. Fallback to per-task load balancing",
                    service.endpoint_mode, service.name
                ),
                _ if !record.network_settings.networks.is_empty() => {
                    records.push(record);
                    continue;
                }
                _ => warn!(
                    "No network found for service {}, falling back to its tasks",
                    service.name
                ),
            }
        }

        match list_tasks(api, service, &record, &networks).await {
            Ok(tasks) => {
                debug!("Tasks for service {}: {:?}", service.name, tasks);
                records.extend(tasks);
            }
            Err(e) => warn!("No tasks found for service {}, error {}", service.name, e),
        }
    }
    Ok(records)
}

fn wants_swarm_lb(service: &ServiceInfo, lb_label: &str) -> bool {
    service
        .labels
        .get(lb_label)
        .is_some_and(|v| parse_bool(v.trim()))
}

/// Truthy spellings of a boolean label value.
fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "t" | "T" | "true" | "TRUE" | "True")
}

/// Service-level record. Only VIP-mode services carry networks; a DNSRR
/// service has no stable address of its own.
pub fn parse_service(service: &ServiceInfo, networks: &NetworkMap) -> DiscoveryRecord {
    let resolved = match service.endpoint_mode {
        EndpointMode::Vip => resolve_virtual_ips(&service.virtual_ips, networks),
        EndpointMode::Dnsrr | EndpointMode::Unset => Default::default(),
    };

    DiscoveryRecord {
        service_name: service.name.clone(),
        name: service.name.clone(),
        labels: service.labels.clone().into_iter().collect(),
        network_settings: NetworkSettings {
            networks: resolved,
            ..Default::default()
        },
        ..Default::default()
    }
}

async fn list_tasks(
    api: &dyn DaemonApi,
    service: &ServiceInfo,
    service_record: &DiscoveryRecord,
    networks: &NetworkMap,
) -> Result<Vec<DiscoveryRecord>, DaemonError> {
    let tasks = api.list_tasks(&running_tasks_filter(&service.id)).await?;

    let mut records = Vec::new();
    for task in &tasks {
        if task.state != TaskState::Running {
            warn!(
                "Task {} is not in the desired state (current state: {}, desired state: {}, service: {})",
                task.id,
                task.state,
                TaskState::Running,
                service.id
            );
            continue;
        }
        let record = parse_task(task, service_record, networks, service.global);
        if record.network_settings.networks.is_empty() {
            warn!(
                "No networks found for task {} (service: {})",
                task.id, service.id
            );
            continue;
        }
        records.push(record);
    }
    Ok(records)
}

/// Task record inheriting the service's name and labels. Replicated tasks
/// are named by slot; global tasks have no meaningful slot and use their ID.
pub fn parse_task(
    task: &TaskInfo,
    service_record: &DiscoveryRecord,
    networks: &NetworkMap,
    global: bool,
) -> DiscoveryRecord {
    let name = match task.slot {
        Some(slot) if !global => format!("{}.{}", service_record.name, slot),
        _ => format!("{}.{}", service_record.name, task.id),
    };

    DiscoveryRecord {
        service_name: service_record.name.clone(),
        name,
        labels: service_record.labels.clone(),
        network_settings: NetworkSettings {
            networks: resolve_attachments(&task.networks, networks),
            ..Default::default()
        },
        ..Default::default()
    }
}
