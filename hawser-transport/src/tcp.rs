//! TCP socket construction.
//!
//! One `host:port` pair can resolve to several candidate addresses in a
//! dual-stack environment. The listen path binds every candidate (a single
//! logical endpoint may need one socket per address family); the connect
//! path walks the candidates in resolution order and returns the first that
//! accepts.

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, StreamOwned};
use socket2::{Domain, Protocol, Socket, Type};

use hawser_core::{ConnectAttempt, SocketUri, TransportError};

use crate::factory::ListenSocket;
use crate::stream::ClientStream;
use crate::tls;

/// Resolve `host:port` to its candidate addresses, in resolution order.
pub(crate) fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>, TransportError> {
    let endpoint = format!("{host}:{port}");
    let addrs: Vec<SocketAddr> = endpoint
        .to_socket_addrs()
        .map_err(|source| TransportError::AddressResolution {
            endpoint: endpoint.clone(),
            source,
        })?
        .collect();

    if addrs.is_empty() {
        return Err(TransportError::AddressResolution {
            endpoint,
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses resolved"),
        });
    }

    Ok(addrs)
}

/// Bind one listen socket per resolved candidate address.
///
/// The TLS server context is built before any socket is created, so missing
/// credentials fail first; the context is attached to every produced socket
/// for accept-time wrapping. Bind failures are fatal on first error -
/// sockets bound for earlier candidates are closed as the result unwinds.
pub(crate) fn listen(
    uri: &SocketUri,
    host: &str,
    port: u16,
) -> Result<Vec<ListenSocket>, TransportError> {
    let tls = uri
        .tls_params()?
        .map(|params| tls::server_config(&params))
        .transpose()?;

    let addrs = resolve(host, port)?;
    let mut sockets = Vec::with_capacity(addrs.len());
    for addr in addrs {
        let socket = bind_candidate(addr).map_err(|source| TransportError::Bind {
            address: addr.to_string(),
            source,
        })?;
        tracing::debug!(%addr, tls = tls.is_some(), "bound tcp listen socket");
        sockets.push(ListenSocket::tcp(socket, tls.clone()));
    }

    Ok(sockets)
}

fn bind_candidate(addr: SocketAddr) -> io::Result<Socket> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    Ok(socket)
}

/// Connect to the first candidate address that accepts.
pub(crate) fn connect(
    uri: &SocketUri,
    host: &str,
    port: u16,
) -> Result<ClientStream, TransportError> {
    // Client context and server name are fixed across candidates; build them
    // once, before any socket is created.
    let tls = match uri.tls_params()? {
        Some(params) => Some((tls::client_config(&params)?, tls::server_name(host)?)),
        None => None,
    };

    let addrs = resolve(host, port)?;
    connect_candidates(&addrs, tls.as_ref())
}

/// Walk candidate addresses in order, returning the first live connection.
///
/// Every failure is recorded against its address; only when the whole list
/// is exhausted do the attempts surface as one aggregated error.
pub(crate) fn connect_candidates(
    addrs: &[SocketAddr],
    tls: Option<&(Arc<ClientConfig>, ServerName<'static>)>,
) -> Result<ClientStream, TransportError> {
    let mut attempts = Vec::with_capacity(addrs.len());
    for &addr in addrs {
        match connect_candidate(addr, tls) {
            Ok(stream) => {
                tracing::debug!(%addr, tls = stream.is_tls(), "connected");
                return Ok(stream);
            }
            Err(error) => {
                tracing::debug!(%addr, %error, "connect candidate failed");
                attempts.push(ConnectAttempt {
                    address: addr.to_string(),
                    error,
                });
            }
        }
    }

    Err(TransportError::AllConnectAttemptsFailed { attempts })
}

fn connect_candidate(
    addr: SocketAddr,
    tls: Option<&(Arc<ClientConfig>, ServerName<'static>)>,
) -> io::Result<ClientStream> {
    let stream = TcpStream::connect(addr)?;
    match tls {
        None => Ok(ClientStream::Tcp(stream)),
        Some((config, name)) => {
            let conn =
                ClientConnection::new(config.clone(), name.clone()).map_err(io::Error::other)?;
            Ok(ClientStream::Tls(Box::new(StreamOwned::new(conn, stream))))
        }
    }
}
