//! Unix domain socket construction and socket-file lifecycle.
//!
//! Binding a Unix listening socket creates a filesystem node that outlives
//! the socket unless somebody unlinks it, and a stale node blocks any future
//! bind to the same path. The bind side therefore owns cleanup:
//! [`SocketFileGuard`] couples the bound socket to its path and unlinks it
//! exactly once on release or drop, tolerating the node having been removed
//! externally in the meantime.
//!
//! The node's permission bits come from the URI's `mode` parameter. The
//! process file-creation mask is narrowed to `!mode & 0o777` for the bind
//! call only, inside a lock-serialized scope that restores the previous mask
//! on every exit path, so concurrent file creation elsewhere in the process
//! never observes the narrowed mask.

use std::fs;
use std::io;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use socket2::{Domain, SockAddr, Socket, Type};

use hawser_core::{ConnectAttempt, SocketUri, TransportError};

use crate::factory::ListenSocket;
use crate::stream::ClientStream;

/// Serializes all umask manipulation in this process.
static UMASK_LOCK: Mutex<()> = Mutex::new(());

/// Scoped narrowing of the process file-creation mask.
///
/// Holds [`UMASK_LOCK`] for its whole lifetime and restores the previous
/// mask on drop, including on early error returns and unwinds.
struct UmaskScope {
    _serialize: MutexGuard<'static, ()>,
    prev: libc::mode_t,
}

impl UmaskScope {
    /// Narrow the mask so files are created with exactly `mode` bits.
    fn narrow_to(mode: u32) -> Self {
        let serialize = UMASK_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let prev = unsafe { libc::umask((!mode & 0o777) as libc::mode_t) };
        Self {
            _serialize: serialize,
            prev,
        }
    }
}

impl Drop for UmaskScope {
    fn drop(&mut self) {
        unsafe {
            libc::umask(self.prev);
        }
    }
}

/// Couples a bound Unix listening socket to its filesystem node.
///
/// The guard unlinks the node exactly once, either through an explicit
/// [`release`](Self::release) or on drop. The recorded path is cleared
/// before the unlink is attempted, so a second release is a no-op and a
/// node recreated at the same path afterwards is never touched.
#[derive(Debug)]
pub struct SocketFileGuard {
    path: Option<PathBuf>,
}

impl SocketFileGuard {
    pub(crate) fn bound(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// The guarded path, until released.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Unlink the socket node.
    ///
    /// A node already removed by another process is fine; any other unlink
    /// failure is logged as a warning and the socket resource is still
    /// considered released.
    pub fn release(&mut self) {
        if let Some(path) = self.path.take() {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove socket file");
                }
            }
        }
    }
}

impl Drop for SocketFileGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Bind a Unix listening socket at the descriptor's path.
pub(crate) fn listen(uri: &SocketUri, path: &Path) -> Result<ListenSocket, TransportError> {
    let mode = uri.unix_mode()?;

    let bind_err = |source: io::Error| TransportError::Bind {
        address: path.display().to_string(),
        source,
    };

    let socket = Socket::new(Domain::UNIX, Type::STREAM, None).map_err(bind_err)?;
    let addr = SockAddr::unix(path).map_err(bind_err)?;

    {
        let _mask = UmaskScope::narrow_to(mode);
        socket.bind(&addr).map_err(bind_err)?;
    }

    let mode_octal = format!("{mode:03o}");
    tracing::debug!(path = %path.display(), mode = %mode_octal, "bound unix listen socket");
    Ok(ListenSocket::unix(
        socket,
        SocketFileGuard::bound(path.to_path_buf()),
    ))
}

/// Connect to the Unix socket at the descriptor's path.
///
/// No candidate enumeration and no TLS on this transport; a failure is
/// reported through the aggregated connect error with a single attempt.
pub(crate) fn connect(path: &Path) -> Result<ClientStream, TransportError> {
    match UnixStream::connect(path) {
        Ok(stream) => {
            tracing::debug!(path = %path.display(), "connected unix socket");
            Ok(ClientStream::Unix(stream))
        }
        Err(error) => Err(TransportError::AllConnectAttemptsFailed {
            attempts: vec![ConnectAttempt {
                address: path.display().to_string(),
                error,
            }],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::os::unix::fs::PermissionsExt;
    use std::os::unix::net::UnixListener;

    /// Umask-sensitive tests run under one lock so the before/after reads
    /// cannot interleave with another test's narrowed mask.
    static TEST_UMASK: Mutex<()> = Mutex::new(());

    fn current_umask() -> libc::mode_t {
        let cur = unsafe { libc::umask(0) };
        unsafe { libc::umask(cur) };
        cur
    }

    fn parse(raw: &str) -> SocketUri {
        SocketUri::parse(raw).unwrap()
    }

    #[test]
    fn test_listen_creates_node_with_requested_mode() {
        let _serial = TEST_UMASK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.sock");
        let uri = parse(&format!("unix://{}?mode=700", path.display()));

        let before = current_umask();
        let sock = listen(&uri, &path).unwrap();
        assert_eq!(current_umask(), before, "umask not restored");

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o700);
        drop(sock);
    }

    #[test]
    fn test_listen_default_mode() {
        let _serial = TEST_UMASK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.sock");
        let uri = parse(&format!("unix://{}", path.display()));

        let _sock = listen(&uri, &path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_umask_restored_on_bind_failure() {
        let _serial = TEST_UMASK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("app.sock");
        let uri = parse(&format!("unix://{}", path.display()));

        let before = current_umask();
        let err = listen(&uri, &path).unwrap_err();
        assert!(matches!(err, TransportError::Bind { .. }));
        assert_eq!(current_umask(), before, "umask not restored after failed bind");
    }

    #[test]
    fn test_close_unlinks_socket_node() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.sock");
        let uri = parse(&format!("unix://{}", path.display()));

        let sock = listen(&uri, &path).unwrap();
        assert!(path.exists());
        sock.close();
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_unlinks_socket_node() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.sock");
        let uri = parse(&format!("unix://{}", path.display()));

        let sock = listen(&uri, &path).unwrap();
        drop(sock);
        assert!(!path.exists());
    }

    #[test]
    fn test_guard_unlinks_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.sock");
        fs::write(&path, b"").unwrap();

        let mut guard = SocketFileGuard::bound(path.clone());
        guard.release();
        assert!(!path.exists());

        // A node recreated at the same path must not be touched by a second
        // release.
        fs::write(&path, b"").unwrap();
        guard.release();
        assert!(path.exists());
    }

    #[test]
    fn test_guard_tolerates_externally_removed_node() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.sock");
        fs::write(&path, b"").unwrap();

        let mut guard = SocketFileGuard::bound(path.clone());
        fs::remove_file(&path).unwrap();
        guard.release();
        assert!(guard.path().is_none());
    }

    #[test]
    fn test_connect_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let mut stream = connect(&path).unwrap();
        let (mut accepted, _) = listener.accept().unwrap();

        stream.write_all(b"ahoy").unwrap();
        let mut buf = [0u8; 4];
        accepted.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ahoy");
    }

    #[test]
    fn test_connect_failure_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.sock");

        let err = connect(&path).unwrap_err();
        assert!(err.to_string().contains("missing.sock"));
        assert!(matches!(
            err,
            TransportError::AllConnectAttemptsFailed { ref attempts } if attempts.len() == 1
        ));
    }
}
