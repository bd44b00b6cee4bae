//! Blocking PulseAudio session bootstrap.

use crate::error::AudioError;
use libpulse_binding::context::{Context, FlagSet, State as ContextState};
use libpulse_binding::mainloop::standard::{IterateResult, Mainloop};

/// A connected context plus the mainloop that drives it.
///
/// Declaration order matters: the context must drop before the mainloop.
pub(crate) struct PulseSession {
    pub(crate) context: Context,
    mainloop: Mainloop,
}

impl PulseSession {
    /// Create a mainloop, connect a context, and iterate until it is ready.
    pub(crate) fn connect(client_name: &str) -> Result<Self, AudioError> {
        let mut mainloop = Mainloop::new().ok_or(AudioError::Mainloop)?;
        let mut context = Context::new(&mainloop, client_name).ok_or(AudioError::Context)?;

        context
            .connect(None, FlagSet::NOFLAGS, None)
            .map_err(|_| AudioError::Connect)?;

        loop {
            match mainloop.iterate(true) {
                IterateResult::Success(_) => {}
                IterateResult::Quit(_) | IterateResult::Err(_) => {
                    return Err(AudioError::MainloopBroken);
                }
            }
            match context.get_state() {
                ContextState::Ready => break,
                ContextState::Failed | ContextState::Terminated => {
                    return Err(AudioError::Connect);
                }
                _ => {}
            }
        }

        Ok(Self { context, mainloop })
    }

    /// Iterate the mainloop until `done` reports completion.
    pub(crate) fn drive<F>(&mut self, mut done: F) -> Result<(), AudioError>
    where
        F: FnMut() -> bool,
    {
        while !done() {
            match self.mainloop.iterate(true) {
                IterateResult::Success(_) => {}
                IterateResult::Quit(_) | IterateResult::Err(_) => {
                    return Err(AudioError::MainloopBroken);
                }
            }
        }
        Ok(())
    }
}
