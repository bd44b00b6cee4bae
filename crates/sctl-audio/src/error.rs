//! Error types for sctl-audio

/// Audio server errors
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("failed to create PulseAudio mainloop")]
    Mainloop,

    #[error("failed to create PulseAudio context")]
    Context,

    #[error("failed to connect to PulseAudio")]
    Connect,

    #[error("PulseAudio mainloop ended unexpectedly")]
    MainloopBroken,

    #[error("spotify has no active audio stream")]
    StreamNotFound,

    #[error("PulseAudio rejected the operation")]
    OperationFailed,
}
