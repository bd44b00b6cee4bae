//! Snapshot value types for the observed player state.
//!
//! Equality on these types is deliberately identity-reduced: a track whose
//! metadata is still trickling in (artwork URL, rating) compares equal to
//! itself, so downstream change detection only fires on real transitions.

use serde::{Deserialize, Serialize};

/// Track metadata as published on the MPRIS `Metadata` property.
///
/// Two values are equal iff their track ids match; every other field is
/// informational.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Opaque track identifier, e.g. "/com/spotify/track/..."
    pub track_id: String,
    /// Track length in microseconds
    pub length_us: i64,
    pub art_url: String,
    pub album: String,
    pub album_artists: Vec<String>,
    pub artists: Vec<String>,
    pub auto_rating: f64,
    pub disc_number: i32,
    pub title: String,
    pub track_number: i32,
    pub url: String,
}

impl PartialEq for Metadata {
    fn eq(&self, other: &Self) -> bool {
        self.track_id == other.track_id
    }
}

/// One coherent snapshot of the player.
///
/// `status` is the raw MPRIS playback status ("Playing", "Paused",
/// "Stopped", ...); an empty string means no player is attached. `volume`
/// is a percentage, `None` when it could not be determined.
///
/// Equality compares the `(track_id, status, volume)` triple only, so a
/// metadata-only refresh of the same track is not a state change.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlayerState {
    pub metadata: Metadata,
    pub status: String,
    pub volume: Option<i32>,
}

impl PlayerState {
    pub fn new(metadata: Metadata, status: String, volume: Option<i32>) -> Self {
        Self {
            metadata,
            status,
            volume,
        }
    }

    /// Whether any player is attached to this snapshot.
    pub fn is_attached(&self) -> bool {
        !self.status.is_empty()
    }
}

impl PartialEq for PlayerState {
    fn eq(&self, other: &Self) -> bool {
        self.metadata.track_id == other.metadata.track_id
            && self.status == other.status
            && self.volume == other.volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str, title: &str) -> Metadata {
        Metadata {
            track_id: id.to_string(),
            title: title.to_string(),
            ..Metadata::default()
        }
    }

    #[test]
    fn metadata_equality_ignores_everything_but_track_id() {
        let mut a = track("/track/1", "Karma Police");
        let mut b = track("/track/1", "Karma Police (Remastered)");
        b.art_url = "https://example.com/cover.jpg".to_string();
        b.auto_rating = 0.7;
        assert_eq!(a, b);

        a.track_id = "/track/2".to_string();
        assert_ne!(a, b);
    }

    #[test]
    fn state_equality_is_the_triple() {
        let a = PlayerState::new(track("/track/1", "Reckoner"), "Playing".into(), Some(60));
        let mut b = PlayerState::new(track("/track/1", "Reckoner (Live)"), "Playing".into(), Some(60));
        assert_eq!(a, b);

        b.status = "Paused".to_string();
        assert_ne!(a, b);

        b.status = "Playing".to_string();
        b.volume = Some(61);
        assert_ne!(a, b);

        b.volume = None;
        assert_ne!(a, b);
    }

    #[test]
    fn default_state_is_detached() {
        let state = PlayerState::default();
        assert!(!state.is_attached());
        assert_eq!(state.volume, None);
        assert_eq!(state, PlayerState::default());
    }
}
