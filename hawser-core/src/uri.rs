//! Socket URI parsing and validation.
//!
//! A socket URI selects a transport and carries its configuration in the
//! query string:
//!
//! ```text
//! tcp://host:port[?query]
//! unix:///absolute/path[?query]
//! unix:relative/path[?query]
//! ```
//!
//! Recognized query keys: `ssl` (`1` enables TLS), `certfile`, `keyfile`,
//! `sslauth` (`0` disables peer verification), `cacerts`, and `mode`
//! (octal permission bits for the Unix socket file, default `0600`).
//!
//! Parsing performs no I/O; the resulting [`SocketUri`] is a plain immutable
//! value that socket factories consume.

use std::collections::HashMap;
use std::path::PathBuf;

use url::Url;

use crate::error::UriError;

/// Default permission bits for a Unix socket file when `mode` is absent.
pub const DEFAULT_UNIX_MODE: u32 = 0o600;

/// The transport endpoint a socket URI describes.
///
/// TCP endpoints never carry a filesystem path and Unix endpoints never carry
/// a host or port; the enum makes those invariants structural.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A TCP endpoint, resolved at construction time to one or more addresses.
    Tcp {
        /// Hostname or address literal (IPv6 literals keep their brackets)
        host: String,
        /// Port number
        port: u16,
    },
    /// A Unix-domain endpoint identified by its socket file path.
    Unix {
        /// Filesystem path of the socket node
        path: PathBuf,
    },
}

/// Parsed, validated representation of a socket URI.
#[derive(Debug, Clone)]
pub struct SocketUri {
    raw: String,
    endpoint: Endpoint,
    query: HashMap<String, String>,
}

/// TLS parameters derived from the query string.
///
/// Derived on demand rather than stored; [`SocketUri::tls_params`] recomputes
/// them each call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsParams {
    /// Certificate chain file; required whenever `ssl=1`.
    pub certfile: PathBuf,
    /// Private key file. Absent means the key is embedded in `certfile`.
    pub keyfile: Option<PathBuf>,
    /// Whether the peer certificate must verify. `sslauth=0` disables this.
    pub verify_peer: bool,
    /// CA bundle used for verification; required when `verify_peer` is set.
    pub ca_bundle: Option<PathBuf>,
}

impl SocketUri {
    /// Parse and validate a socket URI.
    ///
    /// Leading and trailing whitespace is ignored and the scheme is matched
    /// case-insensitively. For `unix` URIs written in the relative form the
    /// authority component is folded into the path, so `unix:run/app.sock`
    /// and `unix://run/app.sock` both name the relative path `run/app.sock`.
    ///
    /// # Errors
    ///
    /// Returns [`UriError::UnsupportedProtocol`] for schemes other than
    /// `tcp`/`unix`, [`UriError::InvalidPort`] for a missing or unparsable
    /// TCP port, [`UriError::Malformed`] for a TCP URI with a path component
    /// or a Unix URI without one, and [`UriError::UnsupportedPlatform`] for
    /// `unix` URIs on platforms without Unix-domain socket support.
    pub fn parse(uri: &str) -> Result<Self, UriError> {
        let raw = uri.trim().to_string();

        let url = Url::parse(&raw).map_err(|e| match e {
            url::ParseError::InvalidPort => UriError::InvalidPort { uri: raw.clone() },
            other => UriError::Malformed {
                uri: raw.clone(),
                reason: other.to_string(),
            },
        })?;

        // First occurrence wins on duplicate keys.
        let mut query = HashMap::new();
        for (key, value) in url.query_pairs() {
            query
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }

        let endpoint = match url.scheme() {
            "tcp" => {
                let host = match url.host_str() {
                    Some(host) if !host.is_empty() => host.to_string(),
                    _ => {
                        return Err(UriError::Malformed {
                            uri: raw,
                            reason: "missing host".to_string(),
                        })
                    }
                };
                let port = url.port().ok_or_else(|| UriError::InvalidPort {
                    uri: raw.clone(),
                })?;
                if !url.path().is_empty() {
                    return Err(UriError::Malformed {
                        uri: raw,
                        reason: "path has to be empty for tcp sockets".to_string(),
                    });
                }
                Endpoint::Tcp { host, port }
            }

            "unix" => {
                if cfg!(not(unix)) {
                    return Err(UriError::UnsupportedPlatform { uri: raw });
                }
                // A non-empty authority means the path was written relative;
                // fold it back into the path.
                let mut path = String::new();
                if let Some(host) = url.host_str() {
                    path.push_str(host);
                }
                path.push_str(url.path());
                if path.is_empty() {
                    return Err(UriError::Malformed {
                        uri: raw,
                        reason: "missing socket path".to_string(),
                    });
                }
                Endpoint::Unix {
                    path: PathBuf::from(path),
                }
            }

            other => {
                return Err(UriError::UnsupportedProtocol {
                    protocol: other.to_string(),
                    uri: raw,
                })
            }
        };

        Ok(Self {
            raw,
            endpoint,
            query,
        })
    }

    /// The original URI string (trimmed), as used in error messages.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The endpoint this URI describes.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The full query parameter map.
    #[must_use]
    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    /// Look up a single query parameter.
    #[must_use]
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Whether the URI requests TLS (`ssl=1`).
    #[must_use]
    pub fn tls_enabled(&self) -> bool {
        self.query_param("ssl") == Some("1")
    }

    /// Derive the TLS parameters from the query string.
    ///
    /// Returns `Ok(None)` when TLS is not requested.
    ///
    /// # Errors
    ///
    /// Returns [`UriError::MissingTlsCredential`] if `ssl=1` without a
    /// `certfile`, or if peer verification is required (the default) without
    /// a `cacerts` bundle.
    pub fn tls_params(&self) -> Result<Option<TlsParams>, UriError> {
        if !self.tls_enabled() {
            return Ok(None);
        }

        let certfile = self
            .query_param("certfile")
            .map(PathBuf::from)
            .ok_or(UriError::MissingTlsCredential { param: "certfile" })?;

        // Without a keyfile the private key is expected to be part of the
        // certificate file.
        let keyfile = self.query_param("keyfile").map(PathBuf::from);

        let verify_peer = self.query_param("sslauth") != Some("0");
        let ca_bundle = if verify_peer {
            let cacerts = self
                .query_param("cacerts")
                .map(PathBuf::from)
                .ok_or(UriError::MissingTlsCredential { param: "cacerts" })?;
            Some(cacerts)
        } else {
            None
        };

        Ok(Some(TlsParams {
            certfile,
            keyfile,
            verify_peer,
            ca_bundle,
        }))
    }

    /// Permission bits for the Unix socket file, from the `mode` parameter.
    ///
    /// Defaults to `0600` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`UriError::InvalidPermissionMode`] when the value is not an
    /// octal string or carries bits outside `0777`.
    pub fn unix_mode(&self) -> Result<u32, UriError> {
        let Some(raw_mode) = self.query_param("mode") else {
            return Ok(DEFAULT_UNIX_MODE);
        };

        let mode = u32::from_str_radix(raw_mode, 8).map_err(|e| {
            UriError::InvalidPermissionMode {
                mode: raw_mode.to_string(),
                reason: e.to_string(),
            }
        })?;

        if mode > 0o777 {
            return Err(UriError::InvalidPermissionMode {
                mode: raw_mode.to_string(),
                reason: "permission bits out of range".to_string(),
            });
        }

        Ok(mode)
    }
}
