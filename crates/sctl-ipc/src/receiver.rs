//! Receiver: an independent subscriber to the broadcast stream.

use crate::error::IpcError;
use crate::server::SOCKET_PATH;
use crate::wire;
use log::debug;
use sctl_mpris::PlayerState;
use std::io;
use std::path::Path;
use tokio::net::UnixStream;

/// A connected subscriber.
///
/// Construction fails with [`IpcError::NotRunning`] when no server holds
/// the socket, whether the path is missing entirely or a stale file
/// refuses the connection.
pub struct StateReceiver {
    stream: UnixStream,
}

impl StateReceiver {
    /// Connect to the server at [`SOCKET_PATH`].
    pub async fn connect() -> Result<Self, IpcError> {
        Self::connect_at(SOCKET_PATH).await
    }

    /// Connect to a server at an explicit path.
    pub async fn connect_at(path: impl AsRef<Path>) -> Result<Self, IpcError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(IpcError::NotRunning);
        }

        match UnixStream::connect(path).await {
            Ok(stream) => {
                debug!("subscribed to state server at {}", path.display());
                Ok(Self { stream })
            }
            // The server may have exited between the existence check and
            // the connect; both shapes mean "nobody is serving".
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
                ) =>
            {
                Err(IpcError::NotRunning)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Read snapshots and hand each to `callback` until the stream ends.
    ///
    /// End-of-stream (the server shut down) finishes with
    /// [`IpcError::NotRunning`]; a payload that does not deserialize is
    /// fatal to this receiver and finishes with [`IpcError::Malformed`].
    /// No resynchronization is attempted.
    pub async fn start<F>(mut self, mut callback: F) -> Result<(), IpcError>
    where
        F: FnMut(PlayerState),
    {
        loop {
            match wire::read_frame(&mut self.stream).await? {
                None => return Err(IpcError::NotRunning),
                Some(payload) => {
                    let state = wire::decode(&payload)?;
                    callback(state);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::StateServer;
    use sctl_mpris::Metadata;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    fn sample_state(track_id: &str, status: &str) -> PlayerState {
        let metadata = Metadata {
            track_id: track_id.to_string(),
            title: "Everything in Its Right Place".to_string(),
            artists: vec!["Radiohead".to_string()],
            ..Metadata::default()
        };
        PlayerState::new(metadata, status.to_string(), Some(40))
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
    async fn connecting_without_a_server_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("socket");

        assert!(matches!(
            StateReceiver::connect_at(&path).await,
            Err(IpcError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn server_shutdown_ends_the_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("socket");

        let mut server = StateServer::bind_at(&path).await.unwrap();
        let receiver = StateReceiver::connect_at(&path).await.unwrap();
        wait_for_subscribers(&server, 1).await;

        server.send(&sample_state("/track/1", "Playing")).await.unwrap();
        server.shutdown().await.unwrap();

        // The buffered snapshot is still delivered, then the stream ends.
        let mut seen = Vec::new();
        let err = receiver.start(|state| seen.push(state)).await.unwrap_err();
        assert!(matches!(err, IpcError::NotRunning));
        assert_eq!(seen, vec![sample_state("/track/1", "Playing")]);
    }

    #[tokio::test]
    async fn malformed_payload_is_fatal_to_the_receiver() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("socket");

        let listener = tokio::net::UnixListener::bind(&path).unwrap();
        let receiver = StateReceiver::connect_at(&path).await.unwrap();
        let (mut producer, _addr) = listener.accept().await.unwrap();

        let garbage = b"not json";
        let mut frame = (garbage.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(garbage);
        producer.write_all(&frame).await.unwrap();

        let err = receiver.start(|_| {}).await.unwrap_err();
        assert!(matches!(err, IpcError::Malformed(_)));
    }

    #[tokio::test]
    async fn every_receiver_observes_every_send_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("socket");

        let mut server = StateServer::bind_at(&path).await.unwrap();
        let first = StateReceiver::connect_at(&path).await.unwrap();
        let second = StateReceiver::connect_at(&path).await.unwrap();
        wait_for_subscribers(&server, 2).await;

        let state_a = sample_state("/track/a", "Playing");
        let state_b = sample_state("/track/b", "Paused");
        assert_ne!(state_a, state_b);

        server.send(&state_a).await.unwrap();
        server.send(&state_b).await.unwrap();
        server.shutdown().await.unwrap();

        for receiver in [first, second] {
            let mut seen = Vec::new();
            let err = receiver.start(|state| seen.push(state)).await.unwrap_err();
            assert!(matches!(err, IpcError::NotRunning));
            assert_eq!(seen, vec![state_a.clone(), state_b.clone()]);
        }
    }
}
