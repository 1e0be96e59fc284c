//! Connected client streams.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
#[cfg(unix)]
use std::os::unix::net::UnixStream;

use rustls::{ClientConnection, StreamOwned};

/// A connected socket produced by the connect path.
///
/// One logical type covers the three concrete transports so callers can
/// frame their protocol over the result without caring how the URI resolved.
/// TLS streams complete their handshake lazily on first read or write.
pub enum ClientStream {
    /// Plain TCP connection.
    Tcp(TcpStream),
    /// TLS-wrapped TCP connection.
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
    /// Unix-domain connection.
    #[cfg(unix)]
    Unix(UnixStream),
}

impl ClientStream {
    /// Whether this stream is TLS-wrapped.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Shut down the underlying socket.
    ///
    /// # Errors
    ///
    /// Propagates the shutdown error of the underlying socket.
    pub fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.shutdown(how),
            Self::Tls(stream) => stream.sock.shutdown(how),
            #[cfg(unix)]
            Self::Unix(stream) => stream.shutdown(how),
        }
    }
}

impl Read for ClientStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            Self::Tls(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for ClientStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            Self::Tls(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            Self::Tls(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

impl std::fmt::Debug for ClientStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp(stream) => f.debug_tuple("Tcp").field(stream).finish(),
            Self::Tls(stream) => f.debug_tuple("Tls").field(&stream.sock).finish(),
            #[cfg(unix)]
            Self::Unix(stream) => f.debug_tuple("Unix").field(stream).finish(),
        }
    }
}
