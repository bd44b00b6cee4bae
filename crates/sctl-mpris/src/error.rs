//! Error types for sctl-mpris

/// MPRIS client and observer errors
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("D-Bus error: {0}")]
    DBus(#[from] zbus::Error),

    #[error("D-Bus fdo error: {0}")]
    Fdo(#[from] zbus::fdo::Error),

    #[error("invalid D-Bus name: {0}")]
    Name(#[from] zbus::names::Error),

    #[error("spotify is not running")]
    NotRunning,

    #[error("source presence contract violated: {0}")]
    PresenceContract(String),
}
