//! Volume operations on the player's sink input.

use crate::error::AudioError;
use crate::session::PulseSession;
use libpulse_binding::callbacks::ListResult;
use libpulse_binding::volume::{ChannelVolumes, Volume};
use log::debug;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Stream name the player registers its sink input under.
const STREAM_NAME: &str = "Spotify";
const CLIENT_NAME: &str = "spotifyctl";
const QUERY_TIMEOUT: Duration = Duration::from_secs(2);

/// The sink input fields an operation needs.
struct StreamHandle {
    index: u32,
    volume: ChannelVolumes,
    muted: bool,
}

/// Current stream volume in percent.
pub fn get_volume() -> Result<i32, AudioError> {
    let mut session = PulseSession::connect(CLIENT_NAME)?;
    let stream = find_stream(&mut session)?;
    Ok(volume_to_percent(stream.volume.avg()))
}

/// Best-effort volume read for observers: never errors, never blocks the
/// caller for more than [`QUERY_TIMEOUT`].
pub fn query_volume() -> Option<i32> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(get_volume().ok());
    });
    rx.recv_timeout(QUERY_TIMEOUT).ok().flatten()
}

/// Set the stream volume, clamped to 0..=100 percent.
pub fn set_volume(percent: i32) -> Result<(), AudioError> {
    let mut session = PulseSession::connect(CLIENT_NAME)?;
    let stream = find_stream(&mut session)?;
    apply_volume(&mut session, &stream, percent)
}

pub fn increase_volume(delta: i32) -> Result<(), AudioError> {
    shift_volume(delta)
}

pub fn decrease_volume(delta: i32) -> Result<(), AudioError> {
    shift_volume(-delta)
}

pub fn set_muted(muted: bool) -> Result<(), AudioError> {
    let mut session = PulseSession::connect(CLIENT_NAME)?;
    let stream = find_stream(&mut session)?;
    apply_mute(&mut session, stream.index, muted)
}

pub fn toggle_muted() -> Result<(), AudioError> {
    let mut session = PulseSession::connect(CLIENT_NAME)?;
    let stream = find_stream(&mut session)?;
    apply_mute(&mut session, stream.index, !stream.muted)
}

fn shift_volume(delta: i32) -> Result<(), AudioError> {
    let mut session = PulseSession::connect(CLIENT_NAME)?;
    let stream = find_stream(&mut session)?;
    let current = volume_to_percent(stream.volume.avg());
    apply_volume(&mut session, &stream, current + delta)
}

/// Walk the sink input list looking for the player's stream.
fn find_stream(session: &mut PulseSession) -> Result<StreamHandle, AudioError> {
    let found: Rc<RefCell<Option<StreamHandle>>> = Rc::new(RefCell::new(None));
    let done = Rc::new(Cell::new(false));

    {
        let found = Rc::clone(&found);
        let done = Rc::clone(&done);
        session
            .context
            .introspect()
            .get_sink_input_info_list(move |result| match result {
                ListResult::Item(info) => {
                    if info.name.as_deref() == Some(STREAM_NAME) {
                        *found.borrow_mut() = Some(StreamHandle {
                            index: info.index,
                            volume: info.volume,
                            muted: info.mute,
                        });
                    }
                }
                ListResult::End | ListResult::Error => done.set(true),
            });
    }

    session.drive(|| done.get())?;
    found.borrow_mut().take().ok_or(AudioError::StreamNotFound)
}

fn apply_volume(
    session: &mut PulseSession,
    stream: &StreamHandle,
    percent: i32,
) -> Result<(), AudioError> {
    let target = percent_to_volume(percent.clamp(0, 100));
    let mut volume = stream.volume;
    volume.set(volume.len().into(), target);

    debug!("setting stream {} volume to {:?}", stream.index, target);

    let outcome = Rc::new(Cell::new(None));
    {
        let outcome = Rc::clone(&outcome);
        session.context.introspect().set_sink_input_volume(
            stream.index,
            &volume,
            Some(Box::new(move |success| outcome.set(Some(success)))),
        );
    }

    session.drive(|| outcome.get().is_some())?;
    match outcome.get() {
        Some(true) => Ok(()),
        _ => Err(AudioError::OperationFailed),
    }
}

fn apply_mute(session: &mut PulseSession, index: u32, muted: bool) -> Result<(), AudioError> {
    debug!("setting stream {} mute to {}", index, muted);

    let outcome = Rc::new(Cell::new(None));
    {
        let outcome = Rc::clone(&outcome);
        session.context.introspect().set_sink_input_mute(
            index,
            muted,
            Some(Box::new(move |success| outcome.set(Some(success)))),
        );
    }

    session.drive(|| outcome.get().is_some())?;
    match outcome.get() {
        Some(true) => Ok(()),
        _ => Err(AudioError::OperationFailed),
    }
}

fn volume_to_percent(volume: Volume) -> i32 {
    let normal = Volume::NORMAL.0 as f64;
    ((volume.0 as f64 / normal) * 100.0).round() as i32
}

fn percent_to_volume(percent: i32) -> Volume {
    let normal = Volume::NORMAL.0 as f64;
    Volume(((percent as f64 / 100.0) * normal).round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_conversion_is_anchored_at_normal() {
        assert_eq!(volume_to_percent(Volume::NORMAL), 100);
        assert_eq!(volume_to_percent(Volume(0)), 0);
        assert_eq!(percent_to_volume(100), Volume(Volume::NORMAL.0));
        assert_eq!(percent_to_volume(0), Volume(0));
    }

    #[test]
    fn percent_conversion_round_trips_midrange() {
        for percent in [1, 25, 50, 75, 99] {
            assert_eq!(volume_to_percent(percent_to_volume(percent)), percent);
        }
    }
}
