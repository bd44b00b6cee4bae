//! Error types for sctl-ipc

/// Broadcast server and receiver errors
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("player state server is already running, multiple servers are not allowed")]
    AlreadyRunning,

    #[error("player state server is not running")]
    NotRunning,

    #[error("malformed state payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid state frame length: {0} bytes")]
    BadFrame(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
