//! Workload enumeration.
//!
//! [`Discovery`] is picked once from the configuration and decides how the
//! daemon is enumerated and which events are worth watching:
//!
//! * **Standalone**: every running container becomes a record.
//! * **Swarm**: services are enumerated through their virtual IPs or their
//!   running tasks, with addresses resolved against swarm-scoped networks.

pub mod container;
pub mod network;
pub mod service;

use crate::config::Config;
use crate::runtime::{DaemonApi, DaemonError, Filters};
use crate::types::DiscoveryRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    Standalone,
    Swarm {
        /// Label opting a service into VIP load balancing.
        lb_label: String,
    },
}

impl Discovery {
    pub fn from_config(config: &Config) -> Self {
        if config.swarm_mode {
            Discovery::Swarm {
                lb_label: config.swarm_lb_label.clone(),
            }
        } else {
            Discovery::Standalone
        }
    }

    /// One full enumeration pass.
    pub async fn enumerate(&self, api: &dyn DaemonApi) -> Result<Vec<DiscoveryRecord>, DaemonError> {
        match self {
            Discovery::Standalone => container::list_containers(api).await,
            Discovery::Swarm { lb_label } => service::list_services(api, lb_label).await,
        }
    }

    /// Server-side event filter for the watcher.
    pub fn event_filters(&self) -> Filters {
        match self {
            Discovery::Standalone => Filters::new().arg("type", "container"),
            Discovery::Swarm { .. } => Filters::new().arg("scope", "swarm").arg("type", "service"),
        }
    }

    pub fn mode_name(&self) -> &'static str {
        match self {
            Discovery::Standalone => "standalone",
            Discovery::Swarm { .. } => "swarm",
        }
    }
}
