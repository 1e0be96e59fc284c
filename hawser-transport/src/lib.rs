//! # hawser-transport
//!
//! Socket construction for the Hawser socket factory.
//!
//! This crate provides:
//! - `SocketFactory` - turns a parsed socket URI into bound listen sockets
//!   or a connected stream
//! - `ListenSocket` - a bound socket plus its TLS context and, for Unix
//!   sockets, the file-lifecycle guard
//! - `ClientStream` - the connected result, one type across transports
//! - `tls` - Rustls context construction and blocking stream wrappers
//!
//! All operations are synchronous and blocking; the factory performs no
//! threading or scheduling of its own. Callers that need accept loops or
//! non-blocking I/O build them on top of the returned handles.

mod factory;
mod stream;
mod tcp;
pub mod tls;

#[cfg(unix)]
mod uds;

pub use factory::{ListenSocket, SocketFactory};
pub use stream::ClientStream;

#[cfg(unix)]
pub use uds::SocketFileGuard;
