//! One-shot MPRIS client.
//!
//! Thin wrappers over the `org.mpris.MediaPlayer2.Player` interface: each
//! playback command is a single blocking remote call, and `current_state`
//! assembles a fresh [`PlayerState`] from the player's properties plus a
//! best-effort volume query.

use crate::error::PlayerError;
use crate::types::{Metadata, PlayerState};
use std::collections::HashMap;
use zbus::Connection;
use zbus::zvariant::OwnedValue;

/// Well-known bus name of the tracked player.
pub const PLAYER_BUS_NAME: &str = "org.mpris.MediaPlayer2.spotify";
/// Object path every MPRIS player exports.
pub const PLAYER_OBJECT_PATH: &str = "/org/mpris/MediaPlayer2";
/// Player interface carrying Metadata and PlaybackStatus.
pub const PLAYER_INTERFACE: &str = "org.mpris.MediaPlayer2.Player";

const SERVICE_UNKNOWN: &str = "org.freedesktop.DBus.Error.ServiceUnknown";

/// D-Bus proxy for the MPRIS player interface
#[zbus::proxy(
    interface = "org.mpris.MediaPlayer2.Player",
    default_service = "org.mpris.MediaPlayer2.spotify",
    default_path = "/org/mpris/MediaPlayer2"
)]
pub(crate) trait MprisPlayer {
    fn play(&self) -> zbus::Result<()>;
    fn pause(&self) -> zbus::Result<()>;
    fn play_pause(&self) -> zbus::Result<()>;
    fn next(&self) -> zbus::Result<()>;
    fn previous(&self) -> zbus::Result<()>;
    fn stop(&self) -> zbus::Result<()>;
    fn open_uri(&self, uri: &str) -> zbus::Result<()>;

    #[zbus(property)]
    fn metadata(&self) -> zbus::Result<HashMap<String, OwnedValue>>;

    #[zbus(property)]
    fn playback_status(&self) -> zbus::Result<String>;
}

/// Map a failed remote call onto the crate error taxonomy.
///
/// The bus answers ServiceUnknown when nobody owns the player's name; that
/// is "spotify is not running", not a transport problem.
pub(crate) fn map_call_err(err: zbus::Error) -> PlayerError {
    match &err {
        zbus::Error::MethodError(name, _, _) if name.as_str() == SERVICE_UNKNOWN => {
            PlayerError::NotRunning
        }
        _ => PlayerError::DBus(err),
    }
}

/// One-shot command and query client for the player.
pub struct PlayerClient {
    proxy: MprisPlayerProxy<'static>,
}

impl PlayerClient {
    pub async fn connect() -> Result<Self, PlayerError> {
        let connection = Connection::session().await?;
        let proxy = MprisPlayerProxy::new(&connection).await?;
        Ok(Self { proxy })
    }

    pub async fn play(&self) -> Result<(), PlayerError> {
        self.proxy.play().await.map_err(map_call_err)
    }

    pub async fn pause(&self) -> Result<(), PlayerError> {
        self.proxy.pause().await.map_err(map_call_err)
    }

    pub async fn play_pause(&self) -> Result<(), PlayerError> {
        self.proxy.play_pause().await.map_err(map_call_err)
    }

    pub async fn next(&self) -> Result<(), PlayerError> {
        self.proxy.next().await.map_err(map_call_err)
    }

    pub async fn previous(&self) -> Result<(), PlayerError> {
        self.proxy.previous().await.map_err(map_call_err)
    }

    pub async fn stop(&self) -> Result<(), PlayerError> {
        self.proxy.stop().await.map_err(map_call_err)
    }

    pub async fn open_uri(&self, uri: &str) -> Result<(), PlayerError> {
        self.proxy.open_uri(uri).await.map_err(map_call_err)
    }

    pub async fn metadata(&self) -> Result<Metadata, PlayerError> {
        let map = self.proxy.metadata().await.map_err(map_call_err)?;
        Ok(metadata_from_map(&map))
    }

    pub async fn playback_status(&self) -> Result<String, PlayerError> {
        self.proxy.playback_status().await.map_err(map_call_err)
    }

    /// Assemble a fresh snapshot: metadata + status from the player,
    /// volume best-effort from the audio server.
    pub async fn current_state(&self) -> Result<PlayerState, PlayerError> {
        let metadata = self.metadata().await?;
        let status = self.playback_status().await?;
        let volume = tokio::task::spawn_blocking(sctl_audio::query_volume)
            .await
            .unwrap_or(None);
        Ok(PlayerState::new(metadata, status, volume))
    }
}

// ============ Metadata extraction helpers ============

/// Build a [`Metadata`] value from an MPRIS metadata dictionary.
///
/// Missing or oddly-typed entries fall back to their defaults; players are
/// not consistent about which xesam keys they publish.
pub(crate) fn metadata_from_map(map: &HashMap<String, OwnedValue>) -> Metadata {
    Metadata {
        track_id: extract_track_id(map).unwrap_or_default(),
        length_us: extract_i64(map, "mpris:length").unwrap_or_default(),
        art_url: extract_string(map, "mpris:artUrl").unwrap_or_default(),
        album: extract_string(map, "xesam:album").unwrap_or_default(),
        album_artists: extract_string_list(map, "xesam:albumArtist").unwrap_or_default(),
        artists: extract_string_list(map, "xesam:artist").unwrap_or_default(),
        auto_rating: extract_f64(map, "xesam:autoRating").unwrap_or_default(),
        disc_number: extract_i32(map, "xesam:discNumber").unwrap_or_default(),
        title: extract_string(map, "xesam:title").unwrap_or_default(),
        track_number: extract_i32(map, "xesam:trackNumber").unwrap_or_default(),
        url: extract_string(map, "xesam:url").unwrap_or_default(),
    }
}

fn extract_string(map: &HashMap<String, OwnedValue>, key: &str) -> Option<String> {
    use std::ops::Deref;
    use zbus::zvariant::Value;

    map.get(key).and_then(|v| match v.deref() {
        Value::Str(s) => Some(s.to_string()),
        _ => None,
    })
}

fn extract_i64(map: &HashMap<String, OwnedValue>, key: &str) -> Option<i64> {
    use std::ops::Deref;
    use zbus::zvariant::Value;

    map.get(key).and_then(|v| match v.deref() {
        Value::I64(i) => Some(*i),
        Value::U64(u) => Some(*u as i64),
        Value::I32(i) => Some(*i as i64),
        Value::U32(u) => Some(*u as i64),
        _ => None,
    })
}

fn extract_i32(map: &HashMap<String, OwnedValue>, key: &str) -> Option<i32> {
    extract_i64(map, key).map(|i| i as i32)
}

fn extract_f64(map: &HashMap<String, OwnedValue>, key: &str) -> Option<f64> {
    use std::ops::Deref;
    use zbus::zvariant::Value;

    map.get(key).and_then(|v| match v.deref() {
        Value::F64(f) => Some(*f),
        _ => None,
    })
}

fn extract_string_list(map: &HashMap<String, OwnedValue>, key: &str) -> Option<Vec<String>> {
    use std::ops::Deref;
    use zbus::zvariant::Value;

    map.get(key).and_then(|v| match v.deref() {
        Value::Array(arr) => {
            let strings: Vec<String> = arr
                .iter()
                .filter_map(|item| match item {
                    Value::Str(s) => Some(s.to_string()),
                    _ => None,
                })
                .collect();
            if strings.is_empty() { None } else { Some(strings) }
        }
        _ => None,
    })
}

fn extract_track_id(map: &HashMap<String, OwnedValue>) -> Option<String> {
    use std::ops::Deref;
    use zbus::zvariant::Value;

    map.get("mpris:trackid").and_then(|v| match v.deref() {
        Value::ObjectPath(p) => Some(p.to_string()),
        Value::Str(s) => Some(s.to_string()),
        _ => None,
    })
}
