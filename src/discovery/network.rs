//! Swarm network resolution.
//!
//! Service VIPs and task attachments reference overlay networks by ID and
//! carry CIDR-form addresses. Resolution maps each reference onto a named
//! [`NetworkEndpoint`] holding the bare host address. References to networks
//! outside the swarm-scoped set are dropped; a network deleted while a pass
//! is running shows up exactly like that.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use ipnetwork::IpNetwork;
use log::debug;

use crate::runtime::{
    ApiVersion, DaemonApi, DaemonError, Filters, NetworkAttachment, NetworkInfo, ProtocolVersion,
    VirtualIp,
};
use crate::types::NetworkEndpoint;

/// First API version that understands the `scope` network filter.
pub const SWARM_SCOPE_FILTER_VERSION: ProtocolVersion = ProtocolVersion::new(1, 29);

/// Network list filter selecting swarm-scoped networks on a daemon speaking
/// `api_version`. Older daemons only know the overlay driver filter.
pub fn filter_for(api_version: &str) -> Filters {
    if ApiVersion::parse(api_version) >= SWARM_SCOPE_FILTER_VERSION.to_version() {
        Filters::new().arg("scope", "swarm")
    } else {
        Filters::new().arg("driver", "overlay")
    }
}

/// Swarm-scoped networks keyed by ID.
#[derive(Debug, Clone, Default)]
pub struct NetworkMap(HashMap<String, NetworkInfo>);

impl NetworkMap {
    pub async fn fetch(api: &dyn DaemonApi, api_version: &str) -> Result<Self, DaemonError> {
        let networks = api.list_networks(&filter_for(api_version)).await?;
        Ok(networks.into_iter().collect())
    }

    pub fn get(&self, id: &str) -> Option<&NetworkInfo> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<NetworkInfo> for NetworkMap {
    fn from_iter<I: IntoIterator<Item = NetworkInfo>>(iter: I) -> Self {
        Self(iter.into_iter().map(|n| (n.id.clone(), n)).collect())
    }
}

/// Host part of a CIDR address (`10.0.0.7/24` → `10.0.0.7`). A bare IP is
/// accepted as well.
pub fn host_address(cidr: &str) -> Option<String> {
    IpNetwork::from_str(cidr.trim())
        .ok()
        .map(|net| net.ip().to_string())
}

fn endpoint(network: &NetworkInfo, addr: String) -> NetworkEndpoint {
    NetworkEndpoint {
        name: network.name.clone(),
        addr,
        id: network.id.clone(),
        ..Default::default()
    }
}

/// Endpoints of a service from its virtual IPs.
pub fn resolve_virtual_ips(
    virtual_ips: &[VirtualIp],
    networks: &NetworkMap,
) -> BTreeMap<String, NetworkEndpoint> {
    let mut resolved = BTreeMap::new();
    for vip in virtual_ips {
        let Some(network) = networks.get(&vip.network_id) else {
            debug!("Network not found, id: {}", vip.network_id);
            continue;
        };
        if vip.addr.is_empty() {
            debug!("No virtual IPs found in network {}", vip.network_id);
            continue;
        }
        match host_address(&vip.addr) {
            Some(addr) => {
                resolved.insert(network.name.clone(), endpoint(network, addr));
            }
            None => debug!(
                "Unparseable virtual IP {} in network {}",
                vip.addr, vip.network_id
            ),
        }
    }
    resolved
}

/// Endpoints of a task from its network attachments.
pub fn resolve_attachments(
    attachments: &[NetworkAttachment],
    networks: &NetworkMap,
) -> BTreeMap<String, NetworkEndpoint> {
    let mut resolved = BTreeMap::new();
    for attachment in attachments {
        let Some(network) = networks.get(&attachment.network_id) else {
            continue;
        };
        if attachment.addresses.is_empty() {
            debug!("No IP addresses found for network {}", attachment.network_id);
            continue;
        }
        // One entry per network name; the last usable address wins.
        for raw in &attachment.addresses {
            match host_address(raw) {
                Some(addr) => {
                    resolved.insert(network.name.clone(), endpoint(network, addr));
                }
                None => debug!(
                    "Unparseable address {} in network {}",
                    raw, attachment.network_id
                ),
            }
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay() -> NetworkMap {
        [
            NetworkInfo {
                id: "net1".into(),
                name: "web".into(),
            },
            NetworkInfo {
                id: "net2".into(),
                name: "backend".into(),
            },
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn filter_depends_on_api_version() {
        assert_eq!(filter_for("1.28"), Filters::new().arg("driver", "overlay"));
        assert_eq!(filter_for("1.29"), Filters::new().arg("scope", "swarm"));
        assert_eq!(filter_for("1.30"), Filters::new().arg("scope", "swarm"));
        assert_eq!(filter_for("1.9"), Filters::new().arg("driver", "overlay"));
    }

    #[test]
    fn strips_prefix_length() {
        assert_eq!(host_address("10.0.0.7/24").as_deref(), Some("10.0.0.7"));
        assert_eq!(host_address("fd00::5/64").as_deref(), Some("fd00::5"));
        assert_eq!(host_address("10.0.0.7").as_deref(), Some("10.0.0.7"));
        assert_eq!(host_address("not-an-ip"), None);
    }

    #[test]
    fn unknown_network_yields_no_endpoint() {
        let attachments = [NetworkAttachment {
            network_id: "deleted".into(),
            addresses: vec!["10.0.9.3/24".into()],
        }];
        assert!(resolve_attachments(&attachments, &overlay()).is_empty());
    }

    #[test]
    fn resolves_attachments_by_network_name() {
        let attachments = [
            NetworkAttachment {
                network_id: "net1".into(),
                addresses: vec!["10.0.0.7/24".into()],
            },
            NetworkAttachment {
                network_id: "net2".into(),
                addresses: vec![],
            },
        ];
        let resolved = resolve_attachments(&attachments, &overlay());
        assert_eq!(resolved.len(), 1);
        let web = &resolved["web"];
        assert_eq!(web.addr, "10.0.0.7");
        assert_eq!(web.id, "net1");
        assert_eq!(web.port, None);
    }

    #[test]
    fn skips_empty_and_unknown_virtual_ips() {
        let vips = [
            VirtualIp {
                network_id: "net1".into(),
                addr: "10.0.0.2/24".into(),
            },
            VirtualIp {
                network_id: "net2".into(),
                addr: String::new(),
            },
            VirtualIp {
                network_id: "ingress".into(),
                addr: "10.255.0.4/16".into(),
            },
        ];
        let resolved = resolve_virtual_ips(&vips, &overlay());
        assert_eq!(resolved.keys().collect::<Vec<_>>(), vec!["web"]);
        assert_eq!(resolved["web"].addr, "10.0.0.2");
    }
}
