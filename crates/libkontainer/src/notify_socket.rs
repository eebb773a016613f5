//! The rendezvous between `create` and `start`. The listener is bound in
//! the main process before any fork so the init process inherits the fd
//! and can block on it; `start` connects and sends one message, whose
//! content beyond being non-empty is not validated.
use std::io::prelude::*;
use std::os::unix::io::AsRawFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nix::unistd::close;

pub const NOTIFY_SOCKET_DIR: &str = "/tmp";

/// The socket path for a container id, `/tmp/kontainer-<id>.sock`.
pub fn notify_socket_path(container_id: &str) -> PathBuf {
    PathBuf::from(NOTIFY_SOCKET_DIR).join(format!("kontainer-{container_id}.sock"))
}

pub struct NotifyListener {
    socket: UnixListener,
}

impl NotifyListener {
    pub fn new(socket_path: &Path) -> Result<Self> {
        let stream = UnixListener::bind(socket_path)
            .with_context(|| format!("failed to bind notify socket {}", socket_path.display()))?;

        Ok(Self { socket: stream })
    }

    /// Accepts exactly one connection and reads one message. Any non-empty
    /// payload means "start".
    pub fn wait_for_container_start(&self) -> Result<()> {
        match self.socket.accept() {
            Ok((mut socket, _)) => {
                let mut response = String::new();
                socket
                    .read_to_string(&mut response)
                    .context("failed to read notify listener")?;
                log::debug!("received: {}", response);
            }
            Err(e) => Err(e).context("failed to accept on notify listener")?,
        }

        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        close(self.socket.as_raw_fd()).context("failed to close notify listener")?;
        Ok(())
    }
}

pub struct NotifySocket {
    path: PathBuf,
}

impl NotifySocket {
    pub fn new<P: Into<PathBuf>>(socket_path: P) -> Self {
        Self {
            path: socket_path.into(),
        }
    }

    pub fn notify_container_start(&mut self) -> Result<()> {
        log::debug!("notify container start");
        let mut stream = UnixStream::connect(&self.path)
            .with_context(|| format!("failed to connect to {}", self.path.display()))?;
        stream
            .write_all(b"start container")
            .context("failed to send start container")?;
        log::debug!("notify finished");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_notify_socket_path() {
        assert_eq!(
            notify_socket_path("c1"),
            PathBuf::from("/tmp/kontainer-c1.sock")
        );
    }

    #[test]
    fn test_notify_rendezvous() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let socket_path = tmp.path().join("kontainer-test.sock");
        let listener = NotifyListener::new(&socket_path)?;

        let client_path = socket_path.clone();
        let client = thread::spawn(move || {
            let mut socket = NotifySocket::new(client_path);
            socket.notify_container_start().unwrap();
        });

        listener.wait_for_container_start()?;
        listener.close()?;
        client.join().unwrap();
        Ok(())
    }

    #[test]
    fn test_bind_fails_on_existing_socket() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let socket_path = tmp.path().join("kontainer-test.sock");
        let _listener = NotifyListener::new(&socket_path)?;
        assert!(NotifyListener::new(&socket_path).is_err());
        Ok(())
    }
}
