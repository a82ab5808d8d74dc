use thiserror::Error;

/// Failure of a single daemon round trip.
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("docker api error: {0}")]
    Bollard(#[from] bollard::errors::Error),
    #[error("http transport error: {0}")]
    Http(#[from] hyper::Error),
    #[error("invalid request: {0}")]
    Request(#[from] hyper::http::Error),
    #[error("daemon answered {status} for {path}: {body}")]
    Status {
        status: u16,
        path: String,
        body: String,
    },
    #[error("failed to decode daemon response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}
