//! The socket factory: descriptor in, live sockets out.

use std::fmt;
use std::io;
use std::sync::Arc;

use rustls::ServerConfig;
use socket2::{SockAddr, Socket};

use hawser_core::{Endpoint, SocketUri, TransportError, UriError};

use crate::stream::ClientStream;
use crate::tcp;
#[cfg(unix)]
use crate::uds;
#[cfg(unix)]
use crate::uds::SocketFileGuard;

/// Builds sockets from a parsed [`SocketUri`].
///
/// The factory holds no resources of its own; every [`listen`](Self::listen)
/// and [`connect`](Self::connect) call is independent, blocking, and
/// reentrant.
///
/// ## Example
///
/// ```rust,no_run
/// use hawser_transport::SocketFactory;
///
/// let factory = SocketFactory::from_uri("tcp://127.0.0.1:26600")?;
/// for sock in factory.listen()? {
///     sock.listen(128)?;
///     // hand the socket to the accept loop
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct SocketFactory {
    uri: SocketUri,
}

impl SocketFactory {
    /// Create a factory around an already-parsed descriptor.
    #[must_use]
    pub fn new(uri: SocketUri) -> Self {
        Self { uri }
    }

    /// Parse a socket URI and build a factory around it.
    ///
    /// # Errors
    ///
    /// Propagates any [`UriError`] from parsing.
    pub fn from_uri(uri: &str) -> Result<Self, UriError> {
        Ok(Self::new(SocketUri::parse(uri)?))
    }

    /// The descriptor this factory was built around.
    #[must_use]
    pub fn uri(&self) -> &SocketUri {
        &self.uri
    }

    /// Create the bound listening sockets for this descriptor.
    ///
    /// TCP endpoints yield one socket per resolved address (dual-stack hosts
    /// resolve to several); Unix endpoints yield exactly one, wrapped so its
    /// filesystem node is unlinked on close. The sockets are bound but not
    /// yet listening - the caller activates listen mode and owns every
    /// returned socket.
    ///
    /// The first resolution or bind failure aborts the whole call; sockets
    /// bound for earlier candidates are closed as the call unwinds.
    ///
    /// # Errors
    ///
    /// [`TransportError::AddressResolution`], [`TransportError::Bind`],
    /// [`TransportError::Tls`], or a [`TransportError::Uri`] carrying the
    /// descriptor-level failure (missing TLS credentials, invalid mode).
    pub fn listen(&self) -> Result<Vec<ListenSocket>, TransportError> {
        match self.uri.endpoint() {
            Endpoint::Tcp { host, port } => tcp::listen(&self.uri, host, *port),
            #[cfg(unix)]
            Endpoint::Unix { path } => Ok(vec![uds::listen(&self.uri, path)?]),
            #[cfg(not(unix))]
            Endpoint::Unix { .. } => Err(UriError::UnsupportedPlatform {
                uri: self.uri.as_str().to_string(),
            }
            .into()),
        }
    }

    /// Create one connected socket for this descriptor.
    ///
    /// TCP endpoints are tried candidate by candidate in resolution order;
    /// the first success wins and later candidates are never attempted.
    /// Unix endpoints connect directly to the descriptor path.
    ///
    /// # Errors
    ///
    /// [`TransportError::AllConnectAttemptsFailed`] when every candidate
    /// refused (the message lists each address with its failure), plus the
    /// same descriptor-level errors as [`listen`](Self::listen).
    pub fn connect(&self) -> Result<ClientStream, TransportError> {
        match self.uri.endpoint() {
            Endpoint::Tcp { host, port } => tcp::connect(&self.uri, host, *port),
            #[cfg(unix)]
            Endpoint::Unix { path } => uds::connect(path),
            #[cfg(not(unix))]
            Endpoint::Unix { .. } => Err(UriError::UnsupportedPlatform {
                uri: self.uri.as_str().to_string(),
            }
            .into()),
        }
    }
}

/// A bound listening socket, ready for listen-mode activation.
///
/// Carries the TLS server context when the URI requested one (certificate
/// material only - the handshake happens when the caller wraps an accepted
/// stream) and, for Unix sockets, the guard that unlinks the socket node on
/// close.
pub struct ListenSocket {
    socket: Socket,
    tls: Option<Arc<ServerConfig>>,
    #[cfg(unix)]
    guard: Option<SocketFileGuard>,
}

impl ListenSocket {
    pub(crate) fn tcp(socket: Socket, tls: Option<Arc<ServerConfig>>) -> Self {
        Self {
            socket,
            tls,
            #[cfg(unix)]
            guard: None,
        }
    }

    #[cfg(unix)]
    pub(crate) fn unix(socket: Socket, guard: SocketFileGuard) -> Self {
        Self {
            socket,
            tls: None,
            guard: Some(guard),
        }
    }

    /// The underlying bound socket.
    #[must_use]
    pub fn socket(&self) -> &Socket {
        &self.socket
    }

    /// The address this socket is bound to.
    ///
    /// # Errors
    ///
    /// Propagates the underlying `getsockname` error.
    pub fn local_addr(&self) -> io::Result<SockAddr> {
        self.socket.local_addr()
    }

    /// Activate listen mode with the given backlog.
    ///
    /// # Errors
    ///
    /// Propagates the underlying `listen` error.
    pub fn listen(&self, backlog: i32) -> io::Result<()> {
        self.socket.listen(backlog)
    }

    /// The TLS server context to wrap accepted streams with, if the URI
    /// requested TLS.
    #[must_use]
    pub fn tls_config(&self) -> Option<&Arc<ServerConfig>> {
        self.tls.as_ref()
    }

    /// The socket file backing this socket, for Unix listen sockets that
    /// have not been released yet.
    #[cfg(unix)]
    #[must_use]
    pub fn socket_file(&self) -> Option<&std::path::Path> {
        self.guard.as_ref().and_then(SocketFileGuard::path)
    }

    /// Close the socket, releasing the Unix socket node if one is guarded.
    ///
    /// Dropping the socket has the same effect; this form just makes the
    /// release explicit at call sites that want it visible.
    pub fn close(mut self) {
        drop(self.socket);
        #[cfg(unix)]
        if let Some(guard) = &mut self.guard {
            guard.release();
        }
    }

    /// Split into the raw socket and, for Unix sockets, the file guard.
    ///
    /// The caller takes over both: the guard keeps its unlink-on-drop
    /// contract wherever it ends up.
    #[cfg(unix)]
    #[must_use]
    pub fn into_parts(self) -> (Socket, Option<SocketFileGuard>) {
        (self.socket, self.guard)
    }
}

impl fmt::Debug for ListenSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ListenSocket");
        s.field("socket", &self.socket);
        s.field("tls", &self.tls.is_some());
        #[cfg(unix)]
        s.field("socket_file", &self.guard.as_ref().and_then(SocketFileGuard::path));
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    #[test]
    fn test_listen_tcp_loopback() {
        let factory = SocketFactory::from_uri("tcp://127.0.0.1:0").unwrap();
        let sockets = factory.listen().unwrap();
        assert_eq!(sockets.len(), 1);

        let addr = sockets[0].local_addr().unwrap().as_socket().unwrap();
        assert_ne!(addr.port(), 0);
        assert!(sockets[0].tls_config().is_none());
        sockets[0].listen(16).unwrap();
    }

    #[test]
    fn test_listen_tls_without_certfile_fails_before_sockets_exist() {
        let factory = SocketFactory::from_uri("tcp://localhost:0?ssl=1").unwrap();
        let err = factory.listen().unwrap_err();
        assert!(matches!(
            err,
            TransportError::Uri(UriError::MissingTlsCredential { param: "certfile" })
        ));
    }

    #[test]
    fn test_connect_tls_without_certfile_fails_before_sockets_exist() {
        let factory = SocketFactory::from_uri("tcp://localhost:0?ssl=1").unwrap();
        let err = factory.connect().unwrap_err();
        assert!(matches!(
            err,
            TransportError::Uri(UriError::MissingTlsCredential { param: "certfile" })
        ));
    }

    #[test]
    fn test_connect_roundtrip_over_uri() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let factory = SocketFactory::from_uri(&format!("tcp://127.0.0.1:{port}")).unwrap();
        let mut stream = factory.connect().unwrap();
        let (mut accepted, _) = listener.accept().unwrap();

        stream.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        accepted.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[test]
    fn test_connect_refused_aggregates_attempts() {
        // Bind an ephemeral port and release it so the connect is refused.
        let refused = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        let factory =
            SocketFactory::from_uri(&format!("tcp://127.0.0.1:{}", refused.port())).unwrap();
        let err = factory.connect().unwrap_err();
        match err {
            TransportError::AllConnectAttemptsFailed { attempts } => {
                assert_eq!(attempts.len(), 1);
                assert_eq!(attempts[0].address, refused.to_string());
            }
            other => panic!("expected AllConnectAttemptsFailed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_listen_unix_over_uri() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("factory.sock");

        let factory =
            SocketFactory::from_uri(&format!("unix://{}", path.display())).unwrap();
        let mut sockets = factory.listen().unwrap();
        assert_eq!(sockets.len(), 1);

        let sock = sockets.pop().unwrap();
        assert_eq!(sock.socket_file(), Some(path.as_path()));
        assert!(path.exists());

        sock.close();
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_roundtrip_over_uri() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rt.sock");

        let factory =
            SocketFactory::from_uri(&format!("unix://{}", path.display())).unwrap();
        let sockets = factory.listen().unwrap();
        sockets[0].listen(16).unwrap();

        let mut client = factory.connect().unwrap();
        client.write_all(b"ipc!").unwrap();

        let (accepted, _) = sockets[0].socket().accept().unwrap();
        let mut accepted: std::os::unix::net::UnixStream = accepted.into();
        let mut buf = [0u8; 4];
        accepted.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ipc!");
    }
}
