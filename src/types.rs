//! Data structures handed to the configuration builder.
//!
//! A [`DiscoveryRecord`] is the normalised view of one running workload
//! instance, whether it came from a standalone container, a swarm service
//! virtual IP, or a single swarm task. Records are rebuilt from scratch on
//! every enumeration pass and shipped as a complete [`ConfigMessage`];
//! the consumer replaces its previous view wholesale.
//!
//! Maps are ordered so that two passes over an unchanged daemon serialise
//! to identical bytes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Provider name stamped on every snapshot.
pub const PROVIDER_NAME: &str = "docker";

/// A host binding of one exposed container port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub host_ip: String,
    pub host_port: String,
}

/// Exposed port (`80/tcp`) → host bindings.
pub type PortMap = BTreeMap<String, Vec<PortBinding>>;

/// Swarm node that hosts a standalone container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerNode {
    pub id: String,
}

/// Address of a workload instance on one network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEndpoint {
    pub name: String,
    pub addr: String,
    /// Left unset by discovery; the builder picks the port from labels.
    pub port: Option<u16>,
    pub protocol: Option<String>,
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    pub network_mode: String,
    pub ports: PortMap,
    /// Network name → endpoint.
    pub networks: BTreeMap<String, NetworkEndpoint>,
}

/// One running workload instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRecord {
    /// Logical group: the container name, or the swarm service name.
    pub service_name: String,
    /// Unique instance name within a snapshot.
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub network_settings: NetworkSettings,
    /// Health-check status, standalone containers only.
    pub health: Option<String>,
    pub node: Option<ContainerNode>,
}

/// Provider settings the builder needs to render routes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderHints {
    pub domain: String,
    pub exposed_by_default: bool,
    pub use_bind_port_ip: bool,
}

/// A full-replacement snapshot of every running instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMessage {
    pub provider_name: String,
    pub records: Vec<DiscoveryRecord>,
    pub hints: ProviderHints,
}

impl ConfigMessage {
    pub fn new(records: Vec<DiscoveryRecord>, hints: ProviderHints) -> Self {
        Self {
            provider_name: PROVIDER_NAME.to_string(),
            records,
            hints,
        }
    }
}
