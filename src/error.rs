use std::path::PathBuf;

use thiserror::Error;

use crate::runtime::DaemonError;

/// The daemon cannot be reached or the client cannot be built.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("invalid docker endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("failed to read TLS material `{}`: {source}", path.display())]
    TlsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TLS material: {0}")]
    Tls(String),
    #[error("failed to create a client for docker: {0}")]
    Client(#[from] bollard::errors::Error),
    #[error("failed to retrieve information of the docker client and server host: {0}")]
    Handshake(#[source] DaemonError),
}

/// Why one reconciliation attempt stopped.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error("failed to enumerate workloads: {0}")]
    Enumeration(#[source] DaemonError),
    #[error("docker event stream failed: {0}")]
    Stream(#[source] DaemonError),
    #[error("snapshot receiver dropped")]
    ChannelClosed,
    #[error("reconciliation attempt panicked: {0}")]
    Panicked(String),
}

impl ProviderError {
    /// Whether the outer loop should back off and try again.
    pub fn is_retriable(&self) -> bool {
        !matches!(self, ProviderError::ChannelClosed)
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
