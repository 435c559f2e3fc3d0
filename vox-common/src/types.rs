//! Shared vocabulary for the vox playback engine

use serde::{Deserialize, Serialize};

/// Identity of a destination voice channel.
///
/// Opaque to the engine; the transport layer interprets it. Two requests for
/// the same channel id share one queue and one live connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ChannelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// What happens to a track when it finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    /// Completed track is discarded (moved to history).
    #[default]
    Off,
    /// Completed track replays from the head.
    Track,
    /// Completed track is re-enqueued at the tail (queue as ring buffer).
    Queue,
}

impl LoopMode {
    /// Parse the wire representation (0 = off, 1 = track, 2 = queue).
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(LoopMode::Off),
            1 => Some(LoopMode::Track),
            2 => Some(LoopMode::Queue),
            _ => None,
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            LoopMode::Off => 0,
            LoopMode::Track => 1,
            LoopMode::Queue => 2,
        }
    }
}

impl std::fmt::Display for LoopMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopMode::Off => write!(f, "off"),
            LoopMode::Track => write!(f, "track"),
            LoopMode::Queue => write!(f, "queue"),
        }
    }
}

/// How a playback reference was classified during resolution.
///
/// Playlists expand into one `RemoteItem` track per member, so a resolved
/// track is never itself a playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Opaque media URL, not recognized as the remote platform
    Direct,
    /// Single item on the remote video platform
    RemoteItem,
}

/// Requested stream quality for resolved remote items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    High,
    Low,
}

/// Read-only projection of a queued track, suitable for display and events.
///
/// `title` is `None` when metadata resolution was unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub reference: String,
    pub title: Option<String>,
}
