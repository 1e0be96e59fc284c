//! TLS context construction via Rustls.
//!
//! This module turns the [`TlsParams`] derived from a socket URI into
//! ready-to-use Rustls configurations, and provides the blocking stream
//! wrappers callers apply around accepted or connected TCP streams:
//!
//! - [`server_config`] / [`client_config`] - build certificate-bearing
//!   contexts from PEM files named in the URI
//! - [`wrap_server`] / [`wrap_client`] - attach a context to a stream
//!
//! Building a context only loads certificate material; the handshake itself
//! is negotiated lazily by [`rustls::StreamOwned`] on first read or write,
//! so a listen socket can carry its server context from bind time without
//! any network activity.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hawser_transport::tls;
//!
//! // Server side: wrap each accepted stream.
//! let config = tls::server_config(&params)?;
//! let (stream, _peer) = listener.accept()?;
//! let secure = tls::wrap_server(stream, config)?;
//!
//! // Client side: verification is always on; roots come from `cacerts`
//! // or fall back to the bundled webpki roots.
//! let config = tls::client_config(&params)?;
//! let secure = tls::wrap_client(stream, "example.com", config)?;
//! ```

use std::fs::File;
use std::io::BufReader;
use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, ClientConnection, RootCertStore, ServerConfig, ServerConnection};

use hawser_core::{TlsParams, TransportError, UriError};

/// Build a server-side TLS context from URI-derived parameters.
///
/// The certificate chain comes from `certfile` and the private key from
/// `keyfile`, or from `certfile` itself when no separate key file was given.
/// When peer verification is on (the default), connecting clients must
/// present a certificate that verifies against the `cacerts` bundle.
///
/// # Errors
///
/// Returns [`TransportError::Tls`] if any file cannot be read or parsed, or
/// if the certificate/key material is rejected by Rustls.
pub fn server_config(params: &TlsParams) -> Result<Arc<ServerConfig>, TransportError> {
    let cert_chain = load_certs(&params.certfile)?;
    let key_path = params.keyfile.as_deref().unwrap_or(&params.certfile);
    let private_key = load_private_key(key_path)?;

    let builder = ServerConfig::builder();
    let config = if params.verify_peer {
        let ca_bundle = params
            .ca_bundle
            .as_deref()
            .ok_or(UriError::MissingTlsCredential { param: "cacerts" })?;
        let roots = Arc::new(load_root_certs(ca_bundle)?);
        let verifier = WebPkiClientVerifier::builder(roots)
            .build()
            .map_err(|e| TransportError::Tls(format!("cannot build client verifier: {e}")))?;
        builder
            .with_client_cert_verifier(verifier)
            .with_single_cert(cert_chain, private_key)
    } else {
        builder
            .with_no_client_auth()
            .with_single_cert(cert_chain, private_key)
    }
    .map_err(|e| TransportError::Tls(format!("invalid certificate material: {e}")))?;

    Ok(Arc::new(config))
}

/// Build a client-side TLS context from URI-derived parameters.
///
/// Peer verification is always on for outgoing connections regardless of
/// `sslauth`; the trust roots come from `cacerts` when given and otherwise
/// from the bundled webpki roots. The client certificate from `certfile` is
/// presented to the server.
///
/// # Errors
///
/// Returns [`TransportError::Tls`] if any file cannot be read or parsed, or
/// if the certificate/key material is rejected by Rustls.
pub fn client_config(params: &TlsParams) -> Result<Arc<ClientConfig>, TransportError> {
    let roots = match &params.ca_bundle {
        Some(path) => load_root_certs(path)?,
        None => RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
    };

    let cert_chain = load_certs(&params.certfile)?;
    let key_path = params.keyfile.as_deref().unwrap_or(&params.certfile);
    let private_key = load_private_key(key_path)?;

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_client_auth_cert(cert_chain, private_key)
        .map_err(|e| TransportError::Tls(format!("invalid certificate material: {e}")))?;

    Ok(Arc::new(config))
}

/// Wrap an accepted TCP stream in a server-side TLS session.
///
/// The handshake completes lazily on first I/O.
///
/// # Errors
///
/// Returns [`TransportError::Tls`] if the session cannot be created.
pub fn wrap_server(
    stream: TcpStream,
    config: Arc<ServerConfig>,
) -> Result<rustls::StreamOwned<ServerConnection, TcpStream>, TransportError> {
    let conn = ServerConnection::new(config)
        .map_err(|e| TransportError::Tls(format!("cannot create server session: {e}")))?;
    Ok(rustls::StreamOwned::new(conn, stream))
}

/// Wrap a connected TCP stream in a client-side TLS session.
///
/// `name` is the server name used for SNI and certificate verification.
/// The handshake completes lazily on first I/O.
///
/// # Errors
///
/// Returns [`TransportError::Tls`] if the name is invalid or the session
/// cannot be created.
pub fn wrap_client(
    stream: TcpStream,
    name: &str,
    config: Arc<ClientConfig>,
) -> Result<rustls::StreamOwned<ClientConnection, TcpStream>, TransportError> {
    let conn = ClientConnection::new(config, server_name(name)?)
        .map_err(|e| TransportError::Tls(format!("cannot create client session: {e}")))?;
    Ok(rustls::StreamOwned::new(conn, stream))
}

/// Create a `ServerName` from a host string.
///
/// IPv6 literals may keep the brackets they carry in a URI authority.
///
/// # Errors
///
/// Returns [`TransportError::Tls`] if the name is neither a valid DNS name
/// nor an IP address.
pub fn server_name(name: &str) -> Result<ServerName<'static>, TransportError> {
    let name = name
        .strip_prefix('[')
        .and_then(|n| n.strip_suffix(']'))
        .unwrap_or(name);
    ServerName::try_from(name.to_string())
        .map_err(|e| TransportError::Tls(format!("invalid server name '{name}': {e}")))
}

/// Load root certificates from a PEM bundle.
///
/// # Errors
///
/// Returns [`TransportError::Tls`] if the file cannot be read or contains
/// invalid certificates.
pub fn load_root_certs(path: impl AsRef<Path>) -> Result<RootCertStore, TransportError> {
    let path = path.as_ref();
    let certs = load_certs(path)?;
    let mut store = RootCertStore::empty();
    for cert in certs {
        store.add(cert).map_err(|e| {
            TransportError::Tls(format!(
                "invalid root certificate in {}: {e}",
                path.display()
            ))
        })?;
    }
    Ok(store)
}

/// Load certificates from a PEM file.
fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TransportError> {
    let file = File::open(path).map_err(|e| {
        TransportError::Tls(format!("cannot read certificate file {}: {e}", path.display()))
    })?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            TransportError::Tls(format!("invalid certificate file {}: {e}", path.display()))
        })
}

/// Load a private key from a PEM file.
fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TransportError> {
    let file = File::open(path).map_err(|e| {
        TransportError::Tls(format!("cannot read key file {}: {e}", path.display()))
    })?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| TransportError::Tls(format!("invalid key file {}: {e}", path.display())))?
        .ok_or_else(|| {
            TransportError::Tls(format!("no private key found in {}", path.display()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn params(certfile: &Path) -> TlsParams {
        TlsParams {
            certfile: certfile.to_path_buf(),
            keyfile: None,
            verify_peer: false,
            ca_bundle: None,
        }
    }

    #[test]
    fn test_server_name_dns() {
        assert!(server_name("localhost").is_ok());
        assert!(server_name("example.com").is_ok());
    }

    #[test]
    fn test_server_name_strips_ipv6_brackets() {
        assert!(server_name("[::1]").is_ok());
    }

    #[test]
    fn test_server_name_invalid() {
        let err = server_name("not a hostname").unwrap_err();
        assert!(matches!(err, TransportError::Tls(_)));
    }

    #[test]
    fn test_server_config_missing_certfile_names_path() {
        let missing = PathBuf::from("/nonexistent/tls/cert.pem");
        let err = server_config(&params(&missing)).unwrap_err();
        match err {
            TransportError::Tls(msg) => assert!(msg.contains("/nonexistent/tls/cert.pem")),
            other => panic!("expected Tls error, got {other:?}"),
        }
    }

    #[test]
    fn test_client_config_missing_certfile_names_path() {
        let missing = PathBuf::from("/nonexistent/tls/cert.pem");
        let err = client_config(&params(&missing)).unwrap_err();
        assert!(matches!(err, TransportError::Tls(_)));
    }

    #[test]
    fn test_private_key_required_in_certfile_when_no_keyfile() {
        // A PEM file with a certificate-shaped entry but no key section must
        // be rejected when it is also expected to carry the private key.
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        std::fs::write(&cert, "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n")
            .unwrap();
        let err = server_config(&params(&cert)).unwrap_err();
        assert!(matches!(err, TransportError::Tls(_)));
    }
}
