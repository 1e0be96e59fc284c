//! # Hawser
//!
//! URI-configured socket factory for TCP, Unix-domain, and TLS endpoints.
//!
//! Hawser abstracts the transport-specific setup of an IPC or network
//! endpoint behind one construction interface driven entirely by a socket
//! URI string:
//!
//! - `tcp://host:port` - TCP, one bound socket per resolved address family
//! - `unix:///path/to.sock` - Unix-domain, with unlink-on-close lifecycle
//! - `...?ssl=1&certfile=...` - TLS layered on TCP via query parameters
//!
//! ## Quick Start
//!
//! ```rust
//! use hawser::{Endpoint, SocketUri};
//!
//! let uri = SocketUri::parse("tcp://localhost:26600").unwrap();
//! match uri.endpoint() {
//!     Endpoint::Tcp { host, port } => {
//!         assert_eq!(host, "localhost");
//!         assert_eq!(*port, 26600);
//!     }
//!     Endpoint::Unix { .. } => unreachable!(),
//! }
//! ```
//!
//! Listening and connecting go through [`SocketFactory`]:
//!
//! ```rust,no_run
//! use hawser::SocketFactory;
//! use std::io::Write;
//!
//! // Listen side: the caller owns each bound socket and activates listen
//! // mode itself; closing a Unix socket unlinks its filesystem node.
//! let factory = SocketFactory::from_uri("unix:///run/app.sock?mode=660")?;
//! let sockets = factory.listen()?;
//! for sock in &sockets {
//!     sock.listen(128)?;
//! }
//!
//! // Connect side: candidates are tried in resolution order, first
//! // success wins.
//! let mut stream = SocketFactory::from_uri("tcp://localhost:26600")?.connect()?;
//! stream.write_all(b"hello")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! Hawser is composed of two crates:
//!
//! - [`hawser-core`](hawser_core) - the URI descriptor and error taxonomy
//! - [`hawser-transport`](hawser_transport) - socket construction, the
//!   Unix socket-file lifecycle guard, and TLS context building

// Re-export core types
pub use hawser_core::{
    ConnectAttempt, Endpoint, SocketUri, TlsParams, TransportError, UriError, DEFAULT_UNIX_MODE,
};

// Re-export transport
pub use hawser_transport::{ClientStream, ListenSocket, SocketFactory};

#[cfg(unix)]
pub use hawser_transport::SocketFileGuard;

// TLS context construction and stream wrapping
pub use hawser_transport::tls;

/// Prelude module for convenient imports.
///
/// ```rust
/// use hawser::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{ClientStream, Endpoint, SocketFactory, SocketUri, TransportError, UriError};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
