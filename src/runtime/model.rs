//! Daemon-side objects, reduced to the fields discovery reads.
//!
//! These mirror the shapes returned by the Docker engine API but stay
//! independent of any client library so that enumeration logic can be
//! exercised against an in-memory daemon.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{ContainerNode, PortMap};

/// Answer of the version handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerVersion {
    pub version: String,
    pub api_version: String,
}

/// Per-network attachment of a standalone container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerNetwork {
    pub network_id: String,
    pub ip_address: String,
}

/// Detailed state of one standalone container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerDetail {
    pub id: String,
    pub name: String,
    pub running: bool,
    pub health: Option<String>,
    pub network_mode: String,
    pub labels: HashMap<String, String>,
    pub ports: PortMap,
    pub networks: HashMap<String, ContainerNetwork>,
    pub node: Option<ContainerNode>,
}

/// How a cluster service exposes itself to other workloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EndpointMode {
    #[default]
    Unset,
    Vip,
    Dnsrr,
}

impl fmt::Display for EndpointMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointMode::Unset => f.write_str(""),
            EndpointMode::Vip => f.write_str("vip"),
            EndpointMode::Dnsrr => f.write_str("dnsrr"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualIp {
    pub network_id: String,
    /// CIDR form, e.g. `10.0.0.2/24`.
    pub addr: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceInfo {
    pub id: String,
    pub name: String,
    pub labels: HashMap<String, String>,
    /// `true` for global-mode services (one task per node).
    pub global: bool,
    pub endpoint_mode: EndpointMode,
    pub virtual_ips: Vec<VirtualIp>,
}

/// Swarm task lifecycle state as reported by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    New,
    Allocated,
    Pending,
    Assigned,
    Accepted,
    Preparing,
    Ready,
    Starting,
    Running,
    Complete,
    Shutdown,
    Failed,
    Rejected,
    Remove,
    Orphaned,
    #[serde(other)]
    Unknown,
}

impl TaskState {
    /// States a task passes through before it runs. A service whose tasks
    /// sit in one of these has not converged yet.
    pub fn is_starting(self) -> bool {
        matches!(
            self,
            TaskState::New
                | TaskState::Pending
                | TaskState::Assigned
                | TaskState::Accepted
                | TaskState::Preparing
                | TaskState::Starting
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::New => "new",
            TaskState::Allocated => "allocated",
            TaskState::Pending => "pending",
            TaskState::Assigned => "assigned",
            TaskState::Accepted => "accepted",
            TaskState::Preparing => "preparing",
            TaskState::Ready => "ready",
            TaskState::Starting => "starting",
            TaskState::Running => "running",
            TaskState::Complete => "complete",
            TaskState::Shutdown => "shutdown",
            TaskState::Failed => "failed",
            TaskState::Rejected => "rejected",
            TaskState::Remove => "remove",
            TaskState::Orphaned => "orphaned",
            TaskState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Addresses a task holds on one network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkAttachment {
    pub network_id: String,
    /// CIDR form, e.g. `10.0.0.7/24`.
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub id: String,
    pub service_id: String,
    pub slot: Option<u64>,
    pub state: TaskState,
    pub desired_state: TaskState,
    pub networks: Vec<NetworkAttachment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkInfo {
    pub id: String,
    pub name: String,
}

/// One entry of the daemon event stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventMessage {
    pub kind: String,
    pub action: String,
    pub actor_id: String,
    pub attributes: HashMap<String, String>,
}

/// Server-side filter arguments, `key -> [values]`.
///
/// Ordered so the serialised form is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters(BTreeMap<String, Vec<String>>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.entry(key.into()).or_default().push(value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// Whether `value` is accepted for `key`. Keys without any value accept
    /// everything.
    pub fn accepts(&self, key: &str, value: &str) -> bool {
        self.get(key)
            .map_or(true, |values| values.iter().any(|v| v == value))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The daemon's JSON filter syntax: `{"key":["value"]}`.
    pub fn to_json(&self) -> String {
        // A map of strings to string vectors always serialises.
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn into_map(self) -> HashMap<String, Vec<String>> {
        self.0.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_serialise_in_key_order() {
        let filters = Filters::new()
            .arg("service", "abc")
            .arg("desired-state", "running");
        assert_eq!(
            filters.to_json(),
            r#"{"desired-state":["running"],"service":["abc"]}"#
        );
    }

    #[test]
    fn filters_accept_unconstrained_keys() {
        let filters = Filters::new().arg("service", "abc");
        assert!(filters.accepts("service", "abc"));
        assert!(!filters.accepts("service", "def"));
        assert!(filters.accepts("desired-state", "shutdown"));
    }

    #[test]
    fn task_state_parses_daemon_strings() {
        let state: TaskState = serde_json::from_str(r#""preparing""#).unwrap();
        assert_eq!(state, TaskState::Preparing);
        assert!(state.is_starting());

        let state: TaskState = serde_json::from_str(r#""somethingnew""#).unwrap();
        assert_eq!(state, TaskState::Unknown);
        assert!(!TaskState::Running.is_starting());
        assert!(!TaskState::Ready.is_starting());
    }
}
