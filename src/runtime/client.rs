//! Client factory: turns the configured endpoint into a daemon handle.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use bollard::{ClientVersion, Docker};
use log::debug;

use super::docker::DockerDaemon;
use super::raw::RawClient;
use super::version::ProtocolVersion;
use super::{Connector, DaemonApi};
use crate::config::Config;
use crate::error::ConnectionError;

/// Protocol version used against a standalone engine.
pub const DOCKER_API_VERSION: ProtocolVersion = ProtocolVersion::new(1, 21);

/// Protocol version used against a swarm manager.
pub const SWARM_API_VERSION: ProtocolVersion = ProtocolVersion::new(1, 24);

const DEFAULT_HTTP_PORT: u16 = 2375;
const DEFAULT_HTTPS_PORT: u16 = 2376;

/// Where the daemon listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp {
        host: String,
        port: u16,
        /// `https://` was requested explicitly.
        secure: bool,
    },
}

impl Endpoint {
    /// `host:port` form for TCP endpoints.
    pub fn authority(&self) -> Option<String> {
        match self {
            Endpoint::Unix(_) => None,
            Endpoint::Tcp { host, port, .. } if host.contains(':') => {
                Some(format!("[{host}]:{port}"))
            }
            Endpoint::Tcp { host, port, .. } => Some(format!("{host}:{port}")),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
            Endpoint::Tcp { secure, .. } => {
                let scheme = if *secure { "https" } else { "tcp" };
                let authority = self.authority().unwrap_or_default();
                write!(f, "{scheme}://{authority}")
            }
        }
    }
}

impl FromStr for Endpoint {
    type Err = ConnectionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConnectionError::InvalidEndpoint {
            endpoint: raw.to_string(),
            reason: reason.to_string(),
        };

        let (scheme, rest) = raw
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme"))?;

        match scheme {
            "unix" => {
                if rest.is_empty() {
                    return Err(invalid("empty socket path"));
                }
                Ok(Endpoint::Unix(PathBuf::from(rest)))
            }
            "tcp" | "http" | "https" => {
                let secure = scheme == "https";
                let authority = rest.trim_end_matches('/');
                if authority.is_empty() || authority.contains('/') {
                    return Err(invalid("expected host[:port]"));
                }
                let default_port = if secure {
                    DEFAULT_HTTPS_PORT
                } else {
                    DEFAULT_HTTP_PORT
                };
                // IPv6 literals come bracketed; the host is kept bare.
                let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
                    let (host, rest) = bracketed
                        .split_once(']')
                        .ok_or_else(|| invalid("unterminated IPv6 address"))?;
                    let port = match rest {
                        "" => default_port,
                        _ => rest
                            .strip_prefix(':')
                            .and_then(|port| port.parse().ok())
                            .ok_or_else(|| invalid("invalid port"))?,
                    };
                    (host, port)
                } else {
                    match authority.rsplit_once(':') {
                        Some((host, port)) => {
                            let port = port.parse().map_err(|_| invalid("invalid port"))?;
                            (host, port)
                        }
                        None => (authority, default_port),
                    }
                };
                if host.contains('[') || host.contains(']') {
                    return Err(invalid("malformed host"));
                }
                if host.is_empty() {
                    return Err(invalid("empty host"));
                }
                Ok(Endpoint::Tcp {
                    host: host.to_string(),
                    port,
                    secure,
                })
            }
            _ => Err(invalid("unsupported scheme")),
        }
    }
}

/// Builds [`DockerDaemon`] handles from the provider configuration.
///
/// Only constructs the transport; liveness is checked by the caller through
/// the version handshake.
#[derive(Debug, Clone)]
pub struct DockerConnector {
    config: Arc<Config>,
}

impl DockerConnector {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub fn api_version(&self) -> ProtocolVersion {
        if self.config.swarm_mode {
            SWARM_API_VERSION
        } else {
            DOCKER_API_VERSION
        }
    }

    pub fn create_client(&self) -> Result<DockerDaemon, ConnectionError> {
        let endpoint: Endpoint = self.config.endpoint.parse()?;
        let version = self.api_version();
        let client_version = ClientVersion {
            major_version: version.major as usize,
            minor_version: version.minor as usize,
        };
        let timeout = self.config.request_timeout_secs;

        let tls = match (&endpoint, &self.config.tls) {
            (Endpoint::Unix(_), Some(_)) => {
                return Err(ConnectionError::InvalidEndpoint {
                    endpoint: endpoint.to_string(),
                    reason: "TLS is not supported over a unix socket".to_string(),
                })
            }
            (Endpoint::Tcp { secure: true, .. }, None) => {
                return Err(ConnectionError::InvalidEndpoint {
                    endpoint: endpoint.to_string(),
                    reason: "https endpoint requires TLS material".to_string(),
                })
            }
            (_, Some(tls)) => Some((tls, tls.build_rustls_config()?)),
            (_, None) => None,
        };

        let authority = endpoint.authority().unwrap_or_default();
        let docker = match (&endpoint, &tls) {
            (Endpoint::Unix(path), _) => {
                Docker::connect_with_unix(&path.to_string_lossy(), timeout, &client_version)?
            }
            (Endpoint::Tcp { .. }, Some((material, _))) => Docker::connect_with_ssl(
                &authority,
                &material.key,
                &material.cert,
                &material.ca,
                timeout,
                &client_version,
            )?,
            (Endpoint::Tcp { .. }, None) => {
                Docker::connect_with_http(&authority, timeout, &client_version)?
            }
        };
        debug!("Created docker client for {} (API {})", endpoint, version);

        let raw = RawClient::new(endpoint, tls.map(|(_, config)| config), version);
        Ok(DockerDaemon::new(docker, raw))
    }
}

impl Connector for DockerConnector {
    fn connect(&self) -> Result<Arc<dyn DaemonApi>, ConnectionError> {
        Ok(Arc::new(self.create_client()?))
    }
}
