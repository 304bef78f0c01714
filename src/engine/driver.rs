//! Playback driver contract
//!
//! The engine renders through anything implementing [`PlaybackDriver`].
//! [`PlaybackHandle`] is the shared "currently playing" state a driver uses
//! to let `stop()` reach a render blocked on another thread.

use std::sync::{Condvar, Mutex, PoisonError};

use crate::engine::AudioBuffer;
use crate::error::Result;

/// How a render ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Every frame was handed to the device
    Completed,
    /// `stop()` cut the render short
    Stopped,
}

/// Output device capability consumed by the interrupt controller
///
/// Implementations must tolerate `stop()` and `play()` being called
/// concurrently from different threads.
pub trait PlaybackDriver: Send + Sync {
    /// Halt whatever is rendering right now. Safe to call when idle.
    fn stop(&self);

    /// Render `buffer` at `buffer.sample_rate`, blocking until the clip has
    /// played out or `stop()` is called. Sample-rate conversion to the
    /// physical output rate is the driver's job.
    fn play(&self, buffer: AudioBuffer) -> Result<PlaybackOutcome>;
}

/// Lifecycle of one render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleState {
    Rendering,
    Finished,
    Stopped,
    Failed(String),
}

/// Shared state of the render currently owned by a driver
///
/// Only the first transition out of `Rendering` takes effect, so a stop
/// racing the end of a clip resolves to whichever landed first.
#[derive(Debug)]
pub struct PlaybackHandle {
    state: Mutex<HandleState>,
    changed: Condvar,
}

impl PlaybackHandle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HandleState::Rendering),
            changed: Condvar::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> HandleState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True while no terminal state has been reached
    pub fn is_rendering(&self) -> bool {
        self.state() == HandleState::Rendering
    }

    /// Request the render to stop
    pub fn stop(&self) -> bool {
        self.transition(HandleState::Stopped)
    }

    /// Mark the clip as fully handed to the device
    pub fn finish(&self) -> bool {
        self.transition(HandleState::Finished)
    }

    /// Mark the render as failed
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.transition(HandleState::Failed(reason.into()))
    }

    /// Block until the render leaves `Rendering` and return the final state
    pub fn wait(&self) -> HandleState {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        while *state == HandleState::Rendering {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.clone()
    }

    fn transition(&self, next: HandleState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != HandleState::Rendering {
            return false;
        }
        *state = next;
        self.changed.notify_all();
        true
    }
}

impl Default for PlaybackHandle {
    fn default() -> Self {
        Self::new()
    }
}
