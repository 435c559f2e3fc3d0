//! Boundary contracts consumed by the playback engine
//!
//! The engine never talks to a network or an encoder directly; it drives
//! three injected capabilities:
//!
//! - [`Connector`] / [`Connection`]: the real-time audio transport to a
//!   destination channel
//! - [`ResourceFactory`] / [`MediaResource`]: the pipeline that turns a
//!   source descriptor into a playable, packetized audio stream
//! - [`MetadataService`]: reference classification and metadata for the
//!   remote video platform
//!
//! Implementations are expected to be cheap to clone behind `Arc` and safe
//! to call from multiple channels concurrently.

use async_trait::async_trait;
use std::sync::Arc;

use vox_common::{ChannelId, Quality, TrackKind};

use crate::config::VoiceOptions;
use crate::error::Result;

/// A source the resource factory can materialize.
///
/// Carries the resolved kind so factories can distinguish direct URLs from
/// remote-platform items without re-classifying the reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub reference: String,
    pub kind: TrackKind,
}

/// Descriptive metadata for a single remote item
#[derive(Debug, Clone)]
pub struct RemoteTrackInfo {
    pub title: String,
    pub thumbnail: Option<String>,
    pub duration_seconds: Option<u64>,
}

/// One member of a remote playlist
#[derive(Debug, Clone)]
pub struct PlaylistEntry {
    pub reference: String,
    pub info: Option<RemoteTrackInfo>,
}

/// Opens transport connections to destination channels
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a connection to the given channel.
    ///
    /// Returns a handle that has not necessarily reached the ready state
    /// yet; callers bound [`Connection::ready`] with a timeout.
    async fn open(
        &self,
        channel: &ChannelId,
        options: &VoiceOptions,
    ) -> Result<Box<dyn Connection>>;
}

/// A live transport connection to one destination channel
#[async_trait]
pub trait Connection: Send + Sync {
    /// Resolves once the transport has reached the ready state.
    async fn ready(&mut self) -> Result<()>;

    /// Attach a playable resource; its packets flow into the channel.
    ///
    /// Subscribing a new resource detaches the previous one.
    async fn subscribe(&mut self, resource: Arc<dyn MediaResource>) -> Result<()>;

    /// Pause or resume packet flow without tearing the transport down.
    async fn set_paused(&mut self, paused: bool) -> Result<()>;

    /// Number of listeners currently in the destination channel.
    fn listeners(&self) -> usize;

    /// Tear the transport down but permit a later reconnect.
    async fn disconnect(&mut self);

    /// Tear the transport down permanently.
    async fn destroy(&mut self);
}

/// Produces playable resources from source descriptors
#[async_trait]
pub trait ResourceFactory: Send + Sync + 'static {
    /// Create a playable resource for `source`.
    ///
    /// `filters` is the channel's current filter-argument list; `quality`
    /// and `audio_type` come from the play options.
    async fn create(
        &self,
        source: &SourceDescriptor,
        filters: &[String],
        quality: Quality,
        audio_type: &str,
    ) -> Result<Arc<dyn MediaResource>>;
}

/// A playable, packetized audio stream
///
/// Shared between the owning playback session (volume, abort) and the
/// connection it is subscribed to, hence `Arc` and interior mutability on
/// the implementation side.
#[async_trait]
pub trait MediaResource: Send + Sync + 'static {
    /// Resolves once the decoder has entered the playing state.
    async fn wait_playing(&self) -> Result<()>;

    /// Resolves when the stream reaches its natural end.
    ///
    /// Must be safe to await from a single watcher task; aborting the
    /// watcher must not corrupt the resource.
    async fn wait_ended(&self);

    /// Set the playback volume as a ratio in [0, 1].
    fn set_volume(&self, ratio: f64);

    /// Abort the underlying stream; `wait_ended` must not complete as a
    /// natural end after this.
    fn abort(&self);
}

/// Classification and metadata for the remote video platform
#[async_trait]
pub trait MetadataService: Send + Sync + 'static {
    /// Fetch descriptive metadata for a single item reference.
    async fn get_info(&self, reference: &str) -> Result<RemoteTrackInfo>;

    /// Fetch the member list of a playlist reference.
    async fn get_playlist(&self, reference: &str) -> Result<Vec<PlaylistEntry>>;

    /// Whether `reference` matches the platform's single-item URL grammar.
    fn is_item_reference(&self, reference: &str) -> bool;

    /// Whether `reference` matches the platform's playlist URL grammar.
    fn is_playlist_reference(&self, reference: &str) -> bool;
}
