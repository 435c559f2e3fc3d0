//! Configuration structures for the vox playback engine
//!
//! All recognized options are enumerated explicitly with documented
//! defaults; there is no loosely-typed option bag. Timeouts live in
//! `PlayerConfig` and are injected once at engine construction.

use std::time::Duration;

use vox_common::Quality;

use crate::volume::VolumeSpec;

/// Audio type tag passed through to the resource factory when the caller
/// does not specify one.
pub const DEFAULT_AUDIO_TYPE: &str = "arbitrary";

/// What the engine does when a track transition starts while nobody is
/// listening in the destination channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoListenersBehavior {
    /// Keep playing regardless of listener count.
    #[default]
    Continue,
    /// Start the new head paused; a later `resume` picks it up.
    Pause,
    /// Tear the channel session down.
    Leave,
}

/// Per-request playback options
///
/// Defaults match the original manager behavior: high quality, arbitrary
/// audio type, deafened but not muted, stay in the channel after the queue
/// empties only until teardown.
#[derive(Debug, Clone, Default)]
pub struct PlayOptions {
    /// Requested stream quality for remote items (default: High)
    pub quality: Quality,

    /// Audio type tag forwarded to the resource factory
    /// (default: "arbitrary")
    pub audio_type: Option<String>,

    /// Initial volume; `None` keeps the channel's current setting
    pub volume: Option<VolumeSpec>,

    /// Disconnect the transport when a track ends naturally (default: false)
    pub auto_leave: bool,

    /// Join the channel self-deafened (default: true)
    pub self_deaf: Option<bool>,

    /// Join the channel self-muted (default: false)
    pub self_mute: Option<bool>,

    /// Behavior when the channel has no listeners at a track transition
    /// (default: Continue)
    pub no_listeners: NoListenersBehavior,
}

impl PlayOptions {
    pub fn audio_type(&self) -> &str {
        self.audio_type.as_deref().unwrap_or(DEFAULT_AUDIO_TYPE)
    }

    pub fn voice_options(&self) -> VoiceOptions {
        VoiceOptions {
            self_deaf: self.self_deaf.unwrap_or(true),
            self_mute: self.self_mute.unwrap_or(false),
        }
    }
}

/// Options forwarded to the transport when opening a connection
#[derive(Debug, Clone, Copy)]
pub struct VoiceOptions {
    pub self_deaf: bool,
    pub self_mute: bool,
}

impl Default for VoiceOptions {
    fn default() -> Self {
        Self {
            self_deaf: true,
            self_mute: false,
        }
    }
}

/// Engine-wide configuration
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Bound on waiting for a new connection to become ready
    pub connect_timeout: Duration,

    /// Bound on waiting for a direct-stream resource to enter the playing
    /// state
    pub direct_playing_timeout: Duration,

    /// Bound on waiting for a remote-item resource to enter the playing
    /// state (remote fetches are slower than direct streams)
    pub remote_playing_timeout: Duration,

    /// Delay between destroying the old connection and opening the new one
    /// during a reconnect
    pub reconnect_delay: Duration,

    /// EventBus channel capacity
    pub event_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            direct_playing_timeout: Duration::from_secs(5),
            remote_playing_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_millis(2000),
            event_capacity: 256,
        }
    }
}
