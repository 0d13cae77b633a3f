//! TLS for session sockets
//!
//! The engine's endpoints are verified against a PEM trust bundle when one
//! is configured and against the bundled web PKI roots otherwise. A client
//! identity turns on mutual TLS.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::error::{Error, Result};

/// Certificate chain and key presented to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// PEM certificate chain, leaf first
    pub cert_chain: PathBuf,
    /// PEM private key for the leaf certificate
    pub private_key: PathBuf,
}

/// How a session authenticates the engine and itself over TLS
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsConfig {
    /// Name checked against the engine certificate; the host name if unset
    pub sni_name: Option<String>,
    /// PEM bundle replacing the web PKI roots
    pub trust_anchors: Option<PathBuf>,
    /// Mutual TLS identity
    pub identity: Option<ClientIdentity>,
}

impl TlsConfig {
    /// Verify against the web PKI roots, no client identity
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the name sent in SNI and checked against the certificate
    pub fn sni_name(mut self, name: impl Into<String>) -> Self {
        self.sni_name = Some(name.into());
        self
    }

    /// Trust only the certificates in `pem_bundle`
    pub fn trust_anchors(mut self, pem_bundle: impl Into<PathBuf>) -> Self {
        self.trust_anchors = Some(pem_bundle.into());
        self
    }

    /// Present `cert_chain` and `private_key` (both PEM) for mutual TLS
    pub fn identity(
        mut self,
        cert_chain: impl Into<PathBuf>,
        private_key: impl Into<PathBuf>,
    ) -> Self {
        self.identity = Some(ClientIdentity {
            cert_chain: cert_chain.into(),
            private_key: private_key.into(),
        });
        self
    }

    /// Assemble the rustls client configuration, reading every PEM file
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut roots = RootCertStore::empty();
        match &self.trust_anchors {
            Some(bundle) => {
                for anchor in read_cert_chain(bundle)? {
                    roots.add(anchor).map_err(|e| {
                        Error::Tls(format!("unusable trust anchor in {}: {}", bundle.display(), e))
                    })?;
                }
            }
            None => roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
        }

        let builder = ClientConfig::builder().with_root_certificates(roots);
        match &self.identity {
            Some(identity) => builder
                .with_client_auth_cert(
                    read_cert_chain(&identity.cert_chain)?,
                    read_private_key(&identity.private_key)?,
                )
                .map_err(|e| Error::Tls(format!("client identity rejected: {}", e))),
            None => Ok(builder.with_no_client_auth()),
        }
    }
}

/// Run the TLS handshake on a connected socket
pub async fn connect_tls(
    socket: TcpStream,
    host: &str,
    config: &TlsConfig,
) -> Result<TlsStream<TcpStream>> {
    let connector = TlsConnector::from(Arc::new(config.client_config()?));
    let name = config.sni_name.as_deref().unwrap_or(host);
    let server_name = ServerName::try_from(name.to_string())
        .map_err(|_| Error::Tls(format!("{:?} is not a valid TLS server name", name)))?;

    tracing::debug!(sni = name, "TLS handshake");
    connector
        .connect(server_name, socket)
        .await
        .map_err(|e| Error::Tls(format!("handshake with {} failed: {}", name, e)))
}

fn open_pem(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| Error::Tls(format!("cannot open {}: {}", path.display(), e)))
}

fn read_cert_chain(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let chain = rustls_pemfile::certs(&mut open_pem(path)?)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Tls(format!("bad certificate in {}: {}", path.display(), e)))?;
    if chain.is_empty() {
        return Err(Error::Tls(format!("{} holds no certificates", path.display())));
    }
    Ok(chain)
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut open_pem(path)?)
        .map_err(|e| Error::Tls(format!("bad key in {}: {}", path.display(), e)))?
        .ok_or_else(|| Error::Tls(format!("{} holds no private key", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = TlsConfig::new()
            .sni_name("dqp.example.com")
            .trust_anchors("/etc/fedquery/ca.pem")
            .identity("/etc/fedquery/client.pem", "/etc/fedquery/client.key");

        assert_eq!(config.sni_name.as_deref(), Some("dqp.example.com"));
        assert_eq!(config.trust_anchors, Some(PathBuf::from("/etc/fedquery/ca.pem")));
        let identity = config.identity.unwrap();
        assert_eq!(identity.private_key, PathBuf::from("/etc/fedquery/client.key"));
    }

    #[test]
    fn test_web_pki_roots_by_default() {
        assert!(TlsConfig::new().client_config().is_ok());
    }

    #[test]
    fn test_missing_bundle_is_tls_error() {
        let err = TlsConfig::new()
            .trust_anchors("/nonexistent/ca.pem")
            .client_config()
            .unwrap_err();
        assert!(matches!(err, Error::Tls(_)));
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn test_bundle_without_certificates_rejected() {
        let path = std::env::temp_dir().join(format!("fedquery-empty-{}.pem", std::process::id()));
        std::fs::write(&path, "not a certificate\n").unwrap();
        let err = TlsConfig::new().trust_anchors(&path).client_config().unwrap_err();
        let _ = std::fs::remove_file(&path);
        assert!(matches!(err, Error::Tls(msg) if msg.contains("no certificates")));
    }
}
