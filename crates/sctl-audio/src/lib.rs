//! sctl-audio - volume control for the player's PulseAudio stream.
//!
//! Talks to PulseAudio/PipeWire (via pipewire-pulse) with libpulse-binding
//! and targets the player's sink input, not the output sink, so only the
//! player's own stream is affected.
//!
//! Every operation is a short-lived blocking session; async callers should
//! go through `tokio::task::spawn_blocking` or use [`query_volume`], which
//! already isolates the roundtrip on a worker thread with a timeout.

mod control;
mod error;
mod session;

pub use control::{
    decrease_volume, get_volume, increase_volume, query_volume, set_muted, set_volume,
    toggle_muted,
};
pub use error::AudioError;
