//! Change-detecting player observer.
//!
//! Subscribes to two session-bus signals and turns them into a deduplicated
//! sequence of [`PlayerState`] snapshots:
//! - `NameOwnerChanged` on the bus daemon tells us when the player appears
//!   or disappears,
//! - `PropertiesChanged` on the player (subscribed only while it is
//!   present) delivers metadata/status updates.
//!
//! The callback fires at most once per actual (track id, status, volume)
//! transition; metadata-only refreshes of the same track are discarded.

use crate::client::{
    MprisPlayerProxy, PLAYER_BUS_NAME, PLAYER_INTERFACE, PLAYER_OBJECT_PATH, map_call_err,
    metadata_from_map,
};
use crate::error::PlayerError;
use crate::types::{Metadata, PlayerState};
use futures_util::StreamExt;
use log::{debug, info, warn};
use std::collections::HashMap;
use zbus::zvariant::OwnedValue;
use zbus::{Connection, MatchRule, MessageStream, fdo};

const DBUS_SERVICE: &str = "org.freedesktop.DBus";
const DBUS_PATH: &str = "/org/freedesktop/DBus";
const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// Snapshot callback invoked on every effective state change.
pub type StateCallback = Box<dyn FnMut(&PlayerState) + Send>;

/// Whether the player currently owns its bus name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Presence {
    Absent,
    Present,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PresenceEvent {
    Appeared,
    Disappeared,
}

impl PresenceEvent {
    /// Classify a `NameOwnerChanged` delivery by its owner pair. Anything
    /// but a clean appearance or disappearance breaks the bus contract and
    /// must not be papered over.
    fn classify(old_owner: &str, new_owner: &str) -> Result<Self, PlayerError> {
        match (old_owner.is_empty(), new_owner.is_empty()) {
            (true, false) => Ok(Self::Appeared),
            (false, true) => Ok(Self::Disappeared),
            _ => Err(PlayerError::PresenceContract(format!(
                "owner change {:?} -> {:?}",
                old_owner, new_owner
            ))),
        }
    }
}

impl Presence {
    fn apply(&mut self, event: PresenceEvent) -> Result<(), PlayerError> {
        match (*self, event) {
            (Presence::Absent, PresenceEvent::Appeared) => {
                *self = Presence::Present;
                Ok(())
            }
            (Presence::Present, PresenceEvent::Disappeared) => {
                *self = Presence::Absent;
                Ok(())
            }
            (state, event) => Err(PlayerError::PresenceContract(format!(
                "{:?} event while {:?}",
                event, state
            ))),
        }
    }
}

/// Holds the last published snapshot and decides what counts as a change.
#[derive(Debug, Default)]
struct ChangeTracker {
    current: PlayerState,
}

impl ChangeTracker {
    fn current(&self) -> &PlayerState {
        &self.current
    }

    /// Install `candidate` and hand it back only if it differs from the
    /// current snapshot under [`PlayerState`] equality.
    fn absorb(&mut self, candidate: PlayerState) -> Option<&PlayerState> {
        if candidate == self.current {
            return None;
        }
        self.current = candidate;
        Some(&self.current)
    }

    /// Install `state` unconditionally (startup initialization).
    fn replace(&mut self, state: PlayerState) -> &PlayerState {
        self.current = state;
        &self.current
    }

    /// Drop back to the detached default snapshot.
    fn reset(&mut self) -> &PlayerState {
        self.current = PlayerState::default();
        &self.current
    }
}

/// Metadata/status entries carried by one `PropertiesChanged` delivery.
struct PropertiesUpdate {
    metadata: Option<Metadata>,
    status: Option<String>,
}

/// Event-driven observer of the player's state.
///
/// Dropping the observer drops both signal subscriptions (removing their
/// bus match rules) and the connection handle; no explicit teardown call
/// is needed and dropping twice is not a thing.
pub struct PlayerObserver {
    connection: Connection,
    player: MprisPlayerProxy<'static>,
    callback: StateCallback,
}

impl PlayerObserver {
    pub async fn connect() -> Result<Self, PlayerError> {
        let connection = Connection::session().await?;
        let player = MprisPlayerProxy::new(&connection).await?;
        Ok(Self {
            connection,
            player,
            callback: Box::new(|state| debug!("player state changed: {:?}", state)),
        })
    }

    /// Replace the snapshot callback. The default is a log stub, so this
    /// should be called before [`start`](Self::start) to observe anything.
    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&PlayerState) + Send + 'static,
    {
        self.callback = Box::new(callback);
    }

    /// Run the observation loop until the bus connection ends or the
    /// source adapter violates its presence contract.
    ///
    /// If the player is already present, one synchronous state fetch seeds
    /// the current snapshot and the callback fires once with it. After
    /// that the loop is driven entirely by signal delivery.
    pub async fn start(&mut self) -> Result<(), PlayerError> {
        let owner_rule = MatchRule::builder()
            .msg_type(zbus::message::Type::Signal)
            .sender(DBUS_SERVICE)?
            .path(DBUS_PATH)?
            .interface(DBUS_SERVICE)?
            .member("NameOwnerChanged")?
            .arg(0, PLAYER_BUS_NAME)?
            .build();
        let mut owner_stream =
            MessageStream::for_match_rule(owner_rule, &self.connection, Some(32)).await?;

        let mut presence = Presence::Absent;
        let mut tracker = ChangeTracker::default();
        let mut props_stream: Option<MessageStream> = None;

        let dbus = fdo::DBusProxy::new(&self.connection).await?;
        if dbus.name_has_owner(PLAYER_BUS_NAME.try_into()?).await? {
            presence = Presence::Present;
            props_stream = Some(self.subscribe_properties().await?);
            match self.fetch_state().await {
                Ok(state) => {
                    let state = tracker.replace(state);
                    (self.callback)(state);
                }
                Err(PlayerError::NotRunning) => {
                    // The player quit between the presence check and the
                    // query; its disappearance event is already on its
                    // way and will reset the state below.
                    debug!("player vanished during startup query");
                }
                Err(err) => return Err(err),
            }
        }

        info!("observing {} on the session bus", PLAYER_BUS_NAME);

        loop {
            tokio::select! {
                maybe_msg = owner_stream.next() => {
                    let Some(msg) = maybe_msg else {
                        warn!("session bus connection closed");
                        return Ok(());
                    };
                    let msg = msg?;
                    let Some((name, old_owner, new_owner)) = parse_owner_change(&msg) else {
                        continue;
                    };
                    if name != PLAYER_BUS_NAME {
                        continue;
                    }

                    let event = PresenceEvent::classify(&old_owner, &new_owner)?;
                    presence.apply(event)?;

                    match event {
                        PresenceEvent::Appeared => {
                            // No callback yet: the first properties
                            // notification carries the snapshot.
                            debug!("player appeared, subscribing to properties");
                            props_stream = Some(self.subscribe_properties().await?);
                        }
                        PresenceEvent::Disappeared => {
                            debug!("player disappeared");
                            props_stream = None;
                            let state = tracker.reset();
                            (self.callback)(state);
                        }
                    }
                }

                Some(msg) = next_or_pending(&mut props_stream) => {
                    let msg = msg?;
                    let Some(update) = parse_properties_changed(&msg) else {
                        continue;
                    };

                    let metadata = update
                        .metadata
                        .unwrap_or_else(|| tracker.current().metadata.clone());
                    let status = update
                        .status
                        .unwrap_or_else(|| tracker.current().status.clone());
                    let volume = tokio::task::spawn_blocking(sctl_audio::query_volume)
                        .await
                        .unwrap_or(None);

                    let candidate = PlayerState::new(metadata, status, volume);
                    if let Some(state) = tracker.absorb(candidate) {
                        (self.callback)(state);
                    }
                }
            }
        }
    }

    async fn subscribe_properties(&self) -> Result<MessageStream, PlayerError> {
        let rule = MatchRule::builder()
            .msg_type(zbus::message::Type::Signal)
            .sender(PLAYER_BUS_NAME)?
            .path(PLAYER_OBJECT_PATH)?
            .interface(PROPERTIES_INTERFACE)?
            .member("PropertiesChanged")?
            .build();
        Ok(MessageStream::for_match_rule(rule, &self.connection, Some(64)).await?)
    }

    async fn fetch_state(&self) -> Result<PlayerState, PlayerError> {
        let map = self.player.metadata().await.map_err(map_call_err)?;
        let status = self.player.playback_status().await.map_err(map_call_err)?;
        let volume = tokio::task::spawn_blocking(sctl_audio::query_volume)
            .await
            .unwrap_or(None);
        Ok(PlayerState::new(metadata_from_map(&map), status, volume))
    }
}

/// Await the next message of an optional subscription, or park forever
/// while there is none (the select loop's other arms stay live).
async fn next_or_pending(
    stream: &mut Option<MessageStream>,
) -> Option<zbus::Result<zbus::Message>> {
    match stream {
        Some(s) => s.next().await,
        None => std::future::pending().await,
    }
}

/// NameOwnerChanged body: (name, old_owner, new_owner).
fn parse_owner_change(msg: &zbus::Message) -> Option<(String, String, String)> {
    msg.body().deserialize().ok()
}

/// PropertiesChanged body: (interface, changed properties, invalidated).
fn parse_properties_changed(msg: &zbus::Message) -> Option<PropertiesUpdate> {
    let (interface, mut changed, _invalidated): (
        String,
        HashMap<String, OwnedValue>,
        Vec<String>,
    ) = msg.body().deserialize().ok()?;

    if interface != PLAYER_INTERFACE {
        return None;
    }

    let metadata = changed
        .remove("Metadata")
        .and_then(|v| HashMap::<String, OwnedValue>::try_from(v).ok())
        .map(|map| metadata_from_map(&map));
    let status = changed
        .remove("PlaybackStatus")
        .and_then(|v| String::try_from(v).ok());

    Some(PropertiesUpdate { metadata, status })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(track_id: &str, status: &str, volume: Option<i32>) -> PlayerState {
        let metadata = Metadata {
            track_id: track_id.to_string(),
            ..Metadata::default()
        };
        PlayerState::new(metadata, status.to_string(), volume)
    }

    #[test]
    fn classify_owner_pairs() {
        assert_eq!(
            PresenceEvent::classify("", ":1.42").unwrap(),
            PresenceEvent::Appeared
        );
        assert_eq!(
            PresenceEvent::classify(":1.42", "").unwrap(),
            PresenceEvent::Disappeared
        );
        assert!(PresenceEvent::classify(":1.42", ":1.43").is_err());
        assert!(PresenceEvent::classify("", "").is_err());
    }

    #[test]
    fn presence_transitions_are_guarded() {
        let mut presence = Presence::Absent;
        presence.apply(PresenceEvent::Appeared).unwrap();
        assert_eq!(presence, Presence::Present);

        // A second appearance without a disappearance in between is a
        // contract violation, as is the mirror case.
        assert!(presence.apply(PresenceEvent::Appeared).is_err());
        presence.apply(PresenceEvent::Disappeared).unwrap();
        assert!(presence.apply(PresenceEvent::Disappeared).is_err());
    }

    #[test]
    fn tracker_fires_once_per_transition() {
        let mut tracker = ChangeTracker::default();

        assert!(tracker.absorb(state("/track/1", "Playing", Some(50))).is_some());
        // Same triple twice in a row: silent.
        assert!(tracker.absorb(state("/track/1", "Playing", Some(50))).is_none());
        // Any element of the triple changing fires again.
        assert!(tracker.absorb(state("/track/1", "Paused", Some(50))).is_some());
        assert!(tracker.absorb(state("/track/2", "Paused", Some(50))).is_some());
        assert!(tracker.absorb(state("/track/2", "Paused", Some(55))).is_some());
    }

    #[test]
    fn metadata_refresh_is_not_a_transition() {
        let mut tracker = ChangeTracker::default();
        tracker.replace(state("/track/1", "Playing", Some(50)));

        let mut refreshed = state("/track/1", "Playing", Some(50));
        refreshed.metadata.art_url = "https://example.com/late-artwork.jpg".to_string();
        refreshed.metadata.auto_rating = 0.9;
        assert!(tracker.absorb(refreshed).is_none());
    }

    #[test]
    fn reset_rearms_the_tracker() {
        let mut tracker = ChangeTracker::default();
        let snapshot = state("/track/1", "Playing", Some(50));

        tracker.absorb(snapshot.clone()).unwrap();
        assert_eq!(tracker.reset(), &PlayerState::default());
        // The same snapshot counts as a change again after a reset.
        assert!(tracker.absorb(snapshot).is_some());
    }
}
