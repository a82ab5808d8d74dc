//! Plain HTTP/1 requests against the engine API.
//!
//! bollard's generated `Task` model has no `NetworksAttachments`, which is
//! where swarm publishes per-task overlay addresses, so task listing is
//! decoded from the raw JSON here.

use std::sync::Arc;

use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::header::{HOST, USER_AGENT};
use hyper::Request;
use hyper_util::rt::TokioIo;
use log::debug;
use rustls::pki_types::ServerName;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use super::client::Endpoint;
use super::error::DaemonError;
use super::model::{Filters, NetworkAttachment, TaskInfo, TaskState};
use super::version::ProtocolVersion;

const USER_AGENT_VALUE: &str = concat!("docksync/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub(crate) struct RawClient {
    endpoint: Endpoint,
    tls: Option<TlsConnector>,
    version: ProtocolVersion,
}

impl RawClient {
    pub(crate) fn new(
        endpoint: Endpoint,
        tls: Option<Arc<rustls::ClientConfig>>,
        version: ProtocolVersion,
    ) -> Self {
        Self {
            endpoint,
            tls: tls.map(TlsConnector::from),
            version,
        }
    }

    pub(crate) async fn list_tasks(&self, filters: &Filters) -> Result<Vec<TaskInfo>, DaemonError> {
        let mut path = format!("/v{}/tasks", self.version);
        if !filters.is_empty() {
            path.push_str("?filters=");
            path.push_str(&encode_query_value(&filters.to_json()));
        }
        let tasks: Vec<WireTask> = self.get_json(&path).await?;
        Ok(tasks.into_iter().map(TaskInfo::from).collect())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, DaemonError> {
        let body = match &self.endpoint {
            #[cfg(unix)]
            Endpoint::Unix(socket) => {
                let stream = tokio::net::UnixStream::connect(socket).await?;
                send(stream, "docker", path).await?
            }
            #[cfg(not(unix))]
            Endpoint::Unix(_) => {
                return Err(DaemonError::Other(
                    "unix sockets are not supported on this platform".to_string(),
                ))
            }
            Endpoint::Tcp { host, port, .. } => {
                let authority = self.endpoint.authority().unwrap_or_default();
                let stream = TcpStream::connect((host.as_str(), *port)).await?;
                match &self.tls {
                    Some(connector) => {
                        let name = ServerName::try_from(host.clone())
                            .map_err(|e| DaemonError::Other(format!("invalid server name: {e}")))?;
                        let stream = connector.connect(name, stream).await?;
                        send(stream, &authority, path).await?
                    }
                    None => send(stream, &authority, path).await?,
                }
            }
        };
        Ok(serde_json::from_slice(&body)?)
    }
}

async fn send<S>(stream: S, host: &str, path: &str) -> Result<Bytes, DaemonError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!("Raw docker connection closed with error: {}", e);
        }
    });

    let request = Request::get(path)
        .header(HOST, host)
        .header(USER_AGENT, USER_AGENT_VALUE)
        .body(Empty::<Bytes>::new())?;
    let response = sender.send_request(request).await?;
    let status = response.status();
    let body = response.into_body().collect().await?.to_bytes();

    if !status.is_success() {
        return Err(DaemonError::Status {
            status: status.as_u16(),
            path: path.to_string(),
            body: String::from_utf8_lossy(&body).trim().to_string(),
        });
    }
    Ok(body)
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireTask {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(rename = "ServiceID", default)]
    service_id: String,
    #[serde(default)]
    slot: Option<u64>,
    #[serde(default)]
    status: Option<WireTaskStatus>,
    #[serde(default)]
    desired_state: Option<TaskState>,
    #[serde(default)]
    networks_attachments: Option<Vec<WireAttachment>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireTaskStatus {
    #[serde(default)]
    state: Option<TaskState>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireAttachment {
    #[serde(default)]
    network: Option<WireNetwork>,
    #[serde(default)]
    addresses: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct WireNetwork {
    #[serde(rename = "ID", default)]
    id: String,
}

impl From<WireTask> for TaskInfo {
    fn from(task: WireTask) -> Self {
        TaskInfo {
            id: task.id,
            service_id: task.service_id,
            slot: task.slot,
            state: task
                .status
                .and_then(|s| s.state)
                .unwrap_or(TaskState::Unknown),
            desired_state: task.desired_state.unwrap_or(TaskState::Unknown),
            networks: task
                .networks_attachments
                .unwrap_or_default()
                .into_iter()
                .map(|a| NetworkAttachment {
                    network_id: a.network.map(|n| n.id).unwrap_or_default(),
                    addresses: a.addresses.unwrap_or_default(),
                })
                .collect(),
        }
    }
}
