//! # hawser-core
//!
//! Core types and error definitions for the Hawser socket factory.
//!
//! This crate provides:
//! - The socket URI descriptor (`SocketUri`, `Endpoint`, `TlsParams`)
//! - Error types (`UriError`, `TransportError`)
//!
//! It performs no I/O; everything here is plain validation and value types.

mod error;
mod uri;

pub use error::{ConnectAttempt, TransportError, UriError};
pub use uri::{Endpoint, SocketUri, TlsParams, DEFAULT_UNIX_MODE};
