//! Error types for socket URI parsing and socket construction.

/// Errors raised while parsing and validating a socket URI.
///
/// These are pure validation failures: no I/O has been attempted when one of
/// them is returned, and every variant names the offending URI or parameter
/// so a misconfiguration is diagnosable from the message alone.
#[derive(Debug, thiserror::Error)]
pub enum UriError {
    /// The URI does not fit the socket URI grammar
    #[error("malformed socket uri {uri}: {reason}")]
    Malformed {
        /// The offending URI
        uri: String,
        /// What was wrong with it
        reason: String,
    },

    /// The URI scheme is neither `tcp` nor `unix`
    #[error("unknown/unsupported protocol '{protocol}' in socket uri {uri}")]
    UnsupportedProtocol {
        /// The rejected scheme, lowercased
        protocol: String,
        /// The offending URI
        uri: String,
    },

    /// The TCP port is missing, non-numeric, or out of the 16-bit range
    #[error("invalid port number in socket uri {uri}")]
    InvalidPort {
        /// The offending URI
        uri: String,
    },

    /// A `unix` URI was given on a platform without Unix-domain sockets
    #[error("unix sockets are not supported on this platform ({uri})")]
    UnsupportedPlatform {
        /// The offending URI
        uri: String,
    },

    /// TLS was requested but a required credential parameter is absent
    #[error("{param} parameter has to be provided in the socket uri if ssl=1")]
    MissingTlsCredential {
        /// Name of the missing query parameter (`certfile` or `cacerts`)
        param: &'static str,
    },

    /// The `mode` query parameter is not a valid octal permission string
    #[error("invalid permission mode '{mode}' in socket uri: {reason}")]
    InvalidPermissionMode {
        /// The rejected mode string
        mode: String,
        /// Why it was rejected
        reason: String,
    },
}

/// A single failed connect attempt against one resolved candidate address.
#[derive(Debug)]
pub struct ConnectAttempt {
    /// The candidate address (or Unix socket path) that was tried
    pub address: String,
    /// The error that candidate produced
    pub error: std::io::Error,
}

impl std::fmt::Display for ConnectAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.address, self.error)
    }
}

fn join_attempts(attempts: &[ConnectAttempt]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised while turning a descriptor into live sockets.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Descriptor-level validation failure surfaced at construction time
    #[error(transparent)]
    Uri(#[from] UriError),

    /// Resolving `host:port` to candidate addresses failed
    #[error("address resolution failed for {endpoint}: {source}")]
    AddressResolution {
        /// The `host:port` pair that failed to resolve
        endpoint: String,
        /// The underlying resolver error
        source: std::io::Error,
    },

    /// Creating or binding a listen socket failed
    #[error("bind failed on {address}: {source}")]
    Bind {
        /// The address or path the bind was attempted on
        address: String,
        /// The underlying socket error
        source: std::io::Error,
    },

    /// Loading certificate material or building a TLS context failed
    #[error("tls error: {0}")]
    Tls(String),

    /// Every resolved candidate address refused the connection
    #[error("connection failed: {}", join_attempts(.attempts))]
    AllConnectAttemptsFailed {
        /// The per-candidate failures, in attempt order
        attempts: Vec<ConnectAttempt>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_error_display_carries_uri() {
        let err = UriError::UnsupportedProtocol {
            protocol: "ftp".to_string(),
            uri: "ftp://example.com:21".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unknown/unsupported protocol 'ftp' in socket uri ftp://example.com:21"
        );
    }

    #[test]
    fn test_missing_credential_names_parameter() {
        let err = UriError::MissingTlsCredential { param: "certfile" };
        assert!(err.to_string().contains("certfile"));
    }

    #[test]
    fn test_connect_attempts_joined_in_order() {
        let err = TransportError::AllConnectAttemptsFailed {
            attempts: vec![
                ConnectAttempt {
                    address: "127.0.0.1:1".to_string(),
                    error: std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "connection refused",
                    ),
                },
                ConnectAttempt {
                    address: "[::1]:1".to_string(),
                    error: std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "connection refused",
                    ),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("127.0.0.1:1"));
        assert!(msg.contains("[::1]:1"));
        let v4 = msg.find("127.0.0.1:1").unwrap();
        let v6 = msg.find("[::1]:1").unwrap();
        assert!(v4 < v6);
    }

    #[test]
    fn test_uri_error_converts_into_transport_error() {
        let err: TransportError = UriError::InvalidPort {
            uri: "tcp://host:notaport".to_string(),
        }
        .into();
        assert!(matches!(err, TransportError::Uri(UriError::InvalidPort { .. })));
    }
}
