//! Playback engine, per-channel sessions, and queue management

pub mod engine;
pub mod queue;
pub mod session;
pub mod state;
pub mod types;

pub use engine::AudioManager;
pub use queue::TrackQueue;
pub use session::{PlaybackSession, SessionSignal};
pub use state::SessionState;
pub use types::{CurrentSong, PauseInterval, Track};
