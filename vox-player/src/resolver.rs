//! Resource resolution
//!
//! Classifies a playback reference as a direct stream, a single remote
//! item, or a remote playlist, and produces the Track entries to enqueue.
//! Metadata fetch failures for single items degrade gracefully; playlist
//! fetch failures do not.

use std::sync::Arc;

use tracing::debug;
use url::Url;

use vox_common::{LoopMode, TrackKind};

use crate::config::PlayOptions;
use crate::driver::MetadataService;
use crate::error::{Error, Result};
use crate::playback::types::Track;

/// Resolves playback references into queueable tracks
#[derive(Clone)]
pub struct Resolver {
    metadata: Arc<dyn MetadataService>,
}

impl Resolver {
    pub fn new(metadata: Arc<dyn MetadataService>) -> Self {
        Self { metadata }
    }

    /// Resolve `reference` into one or more tracks.
    ///
    /// - Remote playlist: one track per member, each carrying the list's
    ///   per-member metadata; fails with `PlaylistUnavailable` when the
    ///   list itself cannot be fetched.
    /// - Remote item: one track; metadata fetch failure leaves
    ///   `metadata = None` and never fails the resolution.
    /// - Anything else: one Direct track, after confirming the reference
    ///   parses as a well-formed locator.
    pub async fn resolve(
        &self,
        reference: &str,
        options: &PlayOptions,
        volume: f64,
        loop_mode: LoopMode,
    ) -> Result<Vec<Track>> {
        if reference.is_empty() {
            return Err(Error::InvalidReference("empty reference".into()));
        }

        if self.metadata.is_playlist_reference(reference) {
            let members = self.metadata.get_playlist(reference).await.map_err(|e| {
                Error::PlaylistUnavailable(format!("{}: {}", reference, e))
            })?;
            debug!(reference, members = members.len(), "resolved playlist");
            return Ok(members
                .into_iter()
                .map(|entry| {
                    let mut track = Track::new(
                        entry.reference,
                        TrackKind::RemoteItem,
                        options,
                        volume,
                        loop_mode,
                    );
                    if let Some(info) = entry.info {
                        track.title = Some(info.title.clone());
                        track.metadata = serde_json::to_value(RemoteMetadata::from(&info)).ok();
                    }
                    track
                })
                .collect());
        }

        if self.metadata.is_item_reference(reference) {
            let mut track = Track::new(
                reference.to_string(),
                TrackKind::RemoteItem,
                options,
                volume,
                loop_mode,
            );
            // Metadata is display-only; play the raw stream without it.
            match self.metadata.get_info(reference).await {
                Ok(info) => {
                    track.title = Some(info.title.clone());
                    track.metadata = serde_json::to_value(RemoteMetadata::from(&info)).ok();
                }
                Err(e) => {
                    debug!(reference, error = %e, "metadata fetch failed, continuing without");
                }
            }
            return Ok(vec![track]);
        }

        // Direct stream: only require a well-formed locator with a host.
        let parsed = Url::parse(reference)
            .map_err(|e| Error::InvalidReference(format!("{}: {}", reference, e)))?;
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(Error::InvalidReference(format!(
                "{}: missing host",
                reference
            )));
        }

        Ok(vec![Track::new(
            reference.to_string(),
            TrackKind::Direct,
            options,
            volume,
            loop_mode,
        )])
    }
}

/// Serialized form of remote metadata stored on a track
#[derive(serde::Serialize)]
struct RemoteMetadata<'a> {
    title: &'a str,
    thumbnail: Option<&'a str>,
    duration_seconds: Option<u64>,
}

impl<'a> From<&'a crate::driver::RemoteTrackInfo> for RemoteMetadata<'a> {
    fn from(info: &'a crate::driver::RemoteTrackInfo) -> Self {
        Self {
            title: &info.title,
            thumbnail: info.thumbnail.as_deref(),
            duration_seconds: info.duration_seconds,
        }
    }
}
