//! Length-prefixed JSON framing for state snapshots.
//!
//! One message = 4-byte big-endian payload length + JSON payload. The
//! explicit prefix keeps message boundaries intact under partial reads and
//! coalesced writes on the stream socket.

use crate::error::IpcError;
use sctl_mpris::PlayerState;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Upper bound on a single payload. A snapshot is a few hundred bytes of
/// metadata strings; anything near this size is a corrupt prefix.
pub(crate) const MAX_FRAME_LEN: usize = 64 * 1024;

pub(crate) fn encode(state: &PlayerState) -> Result<Vec<u8>, IpcError> {
    let payload = serde_json::to_vec(state)?;
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

pub(crate) fn decode(payload: &[u8]) -> Result<PlayerState, IpcError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Read one framed payload.
///
/// `Ok(None)` is end-of-stream: a clean EOF on a frame boundary, or an EOF
/// mid-frame, which only a dying producer can leave behind.
pub(crate) async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, IpcError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 || len > MAX_FRAME_LEN {
        return Err(IpcError::BadFrame(len));
    }

    let mut payload = vec![0u8; len];
    match reader.read_exact(&mut payload).await {
        Ok(_) => Ok(Some(payload)),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sctl_mpris::Metadata;

    fn sample_state() -> PlayerState {
        let metadata = Metadata {
            track_id: "/com/spotify/track/abc123".to_string(),
            title: "Weird Fishes".to_string(),
            artists: vec!["Radiohead".to_string()],
            ..Metadata::default()
        };
        PlayerState::new(metadata, "Playing".to_string(), Some(70))
    }

    #[tokio::test]
    async fn frames_carry_a_snapshot() {
        let state = sample_state();
        let frame = encode(&state).unwrap();

        let mut reader = &frame[..];
        let payload = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(decode(&payload).unwrap(), state);

        // Nothing but the one frame in the buffer.
        assert!(read_frame(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_stream_is_end_of_stream() {
        let mut reader: &[u8] = &[];
        assert!(read_frame(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn truncated_frame_is_end_of_stream() {
        let frame = encode(&sample_state()).unwrap();
        let mut reader = &frame[..frame.len() - 5];
        assert!(read_frame(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_length_prefix_is_rejected() {
        let mut reader: &[u8] = &[0xff, 0xff, 0xff, 0xff, 0x00];
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(IpcError::BadFrame(_))
        ));

        let mut reader: &[u8] = &[0, 0, 0, 0];
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(IpcError::BadFrame(0))
        ));
    }
}
