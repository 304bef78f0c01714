//! Command vocabulary of the control channel

use std::fmt;

use crate::config::CueClips;
use crate::engine::ClipRequest;

/// Line written once the engine accepts commands
pub const READY_LINE: &str = "READY";

/// A recognized control command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    PlayOpen,
    PlayClose,
    MuteToggle,
}

impl Command {
    /// Parse one input line
    ///
    /// Surrounding whitespace is ignored and matching is case-insensitive.
    /// Returns `None` for anything outside the vocabulary, including blank
    /// lines.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_uppercase().as_str() {
            "PLAY_OPEN" => Some(Command::PlayOpen),
            "PLAY_CLOSE" => Some(Command::PlayClose),
            "MUTE_TOGGLE" => Some(Command::MuteToggle),
            _ => None,
        }
    }

    /// Wire name of the command
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::PlayOpen => "PLAY_OPEN",
            Command::PlayClose => "PLAY_CLOSE",
            Command::MuteToggle => "MUTE_TOGGLE",
        }
    }

    /// What the engine should do for this command
    pub fn action(&self, clips: &CueClips) -> Action {
        match self {
            Command::PlayOpen => Action::Play(ClipRequest::new(clips.open.as_str())),
            Command::PlayClose => Action::Play(ClipRequest::new(clips.close.as_str())),
            // Always a stop, whatever the current state
            Command::MuteToggle => Action::Halt,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine-side effect of a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Interrupt current audio, then play the clip
    Play(ClipRequest),
    /// Interrupt current audio
    Halt,
}
