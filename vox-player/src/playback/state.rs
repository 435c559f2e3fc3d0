//! Playback session state

use serde::{Deserialize, Serialize};

/// Lifecycle state of one channel's playback session
///
/// `Idle -> Connecting -> Playing -> {Idle, Paused, Disconnected,
/// Destroyed}`; `Paused` toggles back to `Playing`, `Disconnected` goes
/// back through `Connecting` via reconnect, `Destroyed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Connecting,
    Playing,
    Paused,
    Disconnected,
    Destroyed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Playing => write!(f, "playing"),
            SessionState::Paused => write!(f, "paused"),
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Destroyed => write!(f, "destroyed"),
        }
    }
}
