//! # Vox Player Library (vox-player)
//!
//! Per-channel audio playback queue engine for a real-time voice-streaming
//! client.
//!
//! **Purpose:** Resolve playback references (direct URLs, remote items,
//! playlists) into tracks, maintain an ordered queue per destination
//! channel, drive the underlying streaming connection forward on track
//! completion, and expose transport controls (pause/resume/skip/previous/
//! loop/shuffle/volume/filters).
//!
//! **Architecture:** One [`playback::AudioManager`] per process owning a
//! channel registry; the transport, encoder, and remote-metadata layers are
//! injected behind the [`driver`] traits.

pub mod config;
pub mod driver;
pub mod error;
pub mod filters;
pub mod playback;
pub mod resolver;
pub mod volume;

pub use config::{NoListenersBehavior, PlayOptions, PlayerConfig, VoiceOptions};
pub use error::{Error, Result};
pub use filters::FilterSet;
pub use playback::{AudioManager, CurrentSong, SessionState, Track};
pub use resolver::Resolver;
pub use volume::VolumeSpec;
