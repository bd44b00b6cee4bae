//! Broadcast server: one publisher, any number of subscribers.

use crate::error::IpcError;
use crate::wire;
use log::{debug, info, warn};
use sctl_mpris::PlayerState;
use std::io;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

/// Well-known socket path shared by server and receivers.
pub const SOCKET_PATH: &str = "/tmp/spotifyctl/socket";

/// Fan-out server over a unix stream socket.
///
/// A background acceptor collects incoming connections into a shared set;
/// [`send`](Self::send) serializes a snapshot to every connection and
/// drops the ones whose peer has gone away. The socket path is a singleton
/// resource: binding while another live server holds it fails with
/// [`IpcError::AlreadyRunning`].
pub struct StateServer {
    path: PathBuf,
    connections: Arc<Mutex<Vec<UnixStream>>>,
    stop: watch::Sender<bool>,
    acceptor: Option<JoinHandle<()>>,
}

impl StateServer {
    /// Bind at [`SOCKET_PATH`] and start the background acceptor.
    pub async fn bind() -> Result<Self, IpcError> {
        Self::bind_at(SOCKET_PATH).await
    }

    /// Bind at an explicit path (the well-known one in production, a
    /// scratch path in tests).
    pub async fn bind_at(path: impl Into<PathBuf>) -> Result<Self, IpcError> {
        let path = path.into();
        prepare_socket_path(&path).await?;

        let listener = UnixListener::bind(&path)?;
        info!("state server listening on {}", path.display());

        let connections = Arc::new(Mutex::new(Vec::new()));
        let (stop, stop_rx) = watch::channel(false);
        let acceptor = tokio::spawn(accept_loop(listener, Arc::clone(&connections), stop_rx));

        Ok(Self {
            path,
            connections,
            stop,
            acceptor: Some(acceptor),
        })
    }

    /// Broadcast one snapshot.
    ///
    /// A connection whose write fails has been closed by its peer; it is
    /// removed from the set and never surfaces as an error here. After the
    /// call the set holds exactly the connections that accepted the write.
    pub async fn send(&self, state: &PlayerState) -> Result<(), IpcError> {
        let frame = wire::encode(state)?;

        let mut connections = self.connections.lock().await;
        let before = connections.len();
        let mut alive = Vec::with_capacity(before);
        for mut connection in connections.drain(..) {
            match connection.write_all(&frame).await {
                Ok(()) => alive.push(connection),
                Err(err) => debug!("dropping subscriber: {}", err),
            }
        }
        if alive.len() < before {
            debug!("pruned {} closed subscribers", before - alive.len());
        }
        *connections = alive;
        Ok(())
    }

    /// Number of currently-held subscriber connections.
    pub async fn subscriber_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Ask the background acceptor to exit. Existing connections stay
    /// open. Idempotent.
    pub fn stop_accepting(&self) {
        let _ = self.stop.send(true);
    }

    /// Close the listening socket, drop the held connections (subscribers
    /// observe end-of-stream) and remove the socket file. Safe to call
    /// again after a previous shutdown.
    pub async fn shutdown(&mut self) -> Result<(), IpcError> {
        self.stop_accepting();
        if let Some(acceptor) = self.acceptor.take() {
            let _ = acceptor.await;
        }
        self.connections.lock().await.clear();

        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for StateServer {
    fn drop(&mut self) {
        self.stop_accepting();
        // Only clean the path up if shutdown() never ran; a later server
        // may legitimately own it by now.
        if self.acceptor.is_some() {
            let _ = fs::remove_file(&self.path);
        }
    }
}

impl fmt::Debug for StateServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateServer")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Accept connections until the stop signal fires.
async fn accept_loop(
    listener: UnixListener,
    connections: Arc<Mutex<Vec<UnixStream>>>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => match result {
                Ok((connection, _addr)) => {
                    debug!("subscriber connected");
                    connections.lock().await.push(connection);
                }
                Err(err) => warn!("accept failed: {}", err),
            },
            _ = stop.changed() => break,
        }
    }
    debug!("acceptor stopped");
}

/// Make the socket path bindable, or prove that a live server owns it.
///
/// A leftover socket file is probed by connecting: success means another
/// server is active (fail, leave it alone); a refused connection means the
/// file is stale and can go. A plain file squatting on the parent path is
/// replaced by a directory. Filesystem errors propagate.
async fn prepare_socket_path(path: &Path) -> Result<(), IpcError> {
    if let Some(parent) = path.parent() {
        if parent.is_file() {
            fs::remove_file(parent)?;
        }
        fs::create_dir_all(parent)?;
    }

    if path.exists() {
        match UnixStream::connect(path).await {
            Ok(_probe) => return Err(IpcError::AlreadyRunning),
            Err(err) if err.kind() == io::ErrorKind::ConnectionRefused => {
                debug!("removing stale socket {}", path.display());
                fs::remove_file(path)?;
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sctl_mpris::Metadata;
    use std::time::Duration;

    fn sample_state(track_id: &str) -> PlayerState {
        let metadata = Metadata {
            track_id: track_id.to_string(),
            title: "Pyramid Song".to_string(),
            ..Metadata::default()
        };
        PlayerState::new(metadata, "Playing".to_string(), Some(50))
    }

    async fn wait_for_subscribers(server: &StateServer, count: usize) {
        for _ in 0..200 {
            if server.subscriber_count().await == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("never reached {} subscribers", count);
    }

    #[tokio::test]
    async fn second_server_is_rejected_while_first_lives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("socket");

        let mut first = StateServer::bind_at(&path).await.unwrap();
        assert!(matches!(
            StateServer::bind_at(&path).await,
            Err(IpcError::AlreadyRunning)
        ));

        // The liveness probe of the failed attempt must not disturb the
        // running server.
        first.send(&sample_state("/track/1")).await.unwrap();

        first.shutdown().await.unwrap();
        let mut second = StateServer::bind_at(&path).await.unwrap();
        second.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn stale_socket_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("socket");

        // A socket file with no listener behind it, as left by a crash.
        drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
        assert!(path.exists());

        let mut server = StateServer::bind_at(&path).await.unwrap();
        server.shutdown().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn plain_file_on_parent_path_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let parent = dir.path().join("sockets");
        fs::write(&parent, b"junk").unwrap();

        let mut server = StateServer::bind_at(parent.join("socket")).await.unwrap();
        assert!(parent.is_dir());
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn send_prunes_connections_closed_by_their_peer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("socket");
        let mut server = StateServer::bind_at(&path).await.unwrap();

        let keeper = UnixStream::connect(&path).await.unwrap();
        let closer = UnixStream::connect(&path).await.unwrap();
        wait_for_subscribers(&server, 2).await;

        drop(closer);
        server.send(&sample_state("/track/1")).await.unwrap();
        assert_eq!(server.subscriber_count().await, 1);

        // The surviving connection keeps receiving.
        server.send(&sample_state("/track/2")).await.unwrap();
        assert_eq!(server.subscriber_count().await, 1);

        drop(keeper);
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_twice_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("socket");

        let mut server = StateServer::bind_at(&path).await.unwrap();
        server.shutdown().await.unwrap();
        server.shutdown().await.unwrap();
    }
}
