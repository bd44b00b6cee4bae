//! sctl-mpris - zbus client for the Spotify MPRIS endpoint
//!
//! Two ways in:
//! - `PlayerClient`: one-shot playback commands and state queries
//! - `PlayerObserver`: event-driven stream of deduplicated state snapshots

pub mod client;
pub mod error;
pub mod observer;
pub mod types;

pub use client::PlayerClient;
pub use error::PlayerError;
pub use observer::PlayerObserver;
pub use types::{Metadata, PlayerState};
