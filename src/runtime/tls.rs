//! rustls ClientConfig building for mutual TLS to the daemon.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};

use crate::config::ClientTls;
use crate::error::ConnectionError;

fn open(path: &Path) -> Result<BufReader<File>, ConnectionError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| ConnectionError::TlsFile {
            path: path.to_path_buf(),
            source,
        })
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ConnectionError> {
    let certs = rustls_pemfile::certs(&mut open(path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| ConnectionError::TlsFile {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(ConnectionError::Tls(format!(
            "no certificate found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, ConnectionError> {
    rustls_pemfile::private_key(&mut open(path)?)
        .map_err(|source| ConnectionError::TlsFile {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| {
            ConnectionError::Tls(format!("no private key found in {}", path.display()))
        })
}

impl ClientTls {
    /// Build a rustls ClientConfig that trusts `ca` and presents `cert`/`key`.
    pub fn build_rustls_config(&self) -> Result<Arc<ClientConfig>, ConnectionError> {
        let mut roots = RootCertStore::empty();
        for cert in load_certs(&self.ca)? {
            roots
                .add(cert)
                .map_err(|e| ConnectionError::Tls(format!("invalid CA certificate: {e}")))?;
        }

        let certs = load_certs(&self.cert)?;
        let key = load_key(&self.key)?;

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| ConnectionError::Tls(e.to_string()))?
            .with_root_certificates(roots)
            .with_client_auth_cert(certs, key)
            .map_err(|e| ConnectionError::Tls(e.to_string()))?;

        Ok(Arc::new(config))
    }
}
