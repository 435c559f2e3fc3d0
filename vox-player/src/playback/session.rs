//! Per-channel playback session
//!
//! Owns the live transport connection and the currently playing resource
//! for one channel. At most one resource is live at a time; replacing it
//! through `play` is silent (no natural-end signal for the replaced
//! resource), only an organic end-of-stream reaches the engine.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use vox_common::{ChannelId, TrackKind};

use crate::config::{PlayOptions, PlayerConfig, VoiceOptions};
use crate::driver::{Connection, Connector, MediaResource, ResourceFactory, SourceDescriptor};
use crate::error::{Error, Result};
use crate::filters::FilterSet;
use crate::playback::state::SessionState;

/// Signal from a session's watcher task to the engine
#[derive(Debug, Clone, Copy)]
pub enum SessionSignal {
    /// The resource of play-generation `generation` reached its natural
    /// end. Stale generations are discarded by the engine.
    Ended { generation: u64 },
}

/// The streaming player for one channel
pub struct PlaybackSession {
    channel: ChannelId,
    connector: Arc<dyn Connector>,
    factory: Arc<dyn ResourceFactory>,
    config: PlayerConfig,

    state: SessionState,
    connection: Option<Box<dyn Connection>>,
    resource: Option<Arc<dyn MediaResource>>,

    /// Source and options of the current play, kept for filter restarts
    current: Option<(SourceDescriptor, PlayOptions)>,
    voice_options: VoiceOptions,
    volume: f64,
    filters: FilterSet,

    /// Incremented on every `play`; suppresses end signals of replaced
    /// resources
    generation: u64,
    /// Taken on destroy so the engine's signal drain observes channel close
    signal_tx: Option<mpsc::UnboundedSender<SessionSignal>>,
    watcher: Option<JoinHandle<()>>,
}

impl PlaybackSession {
    /// Create an idle session. The returned receiver carries natural-end
    /// signals and is drained by the engine's per-channel driver task.
    pub fn new(
        channel: ChannelId,
        connector: Arc<dyn Connector>,
        factory: Arc<dyn ResourceFactory>,
        config: PlayerConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SessionSignal>) {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        (
            Self {
                channel,
                connector,
                factory,
                config,
                state: SessionState::Idle,
                connection: None,
                resource: None,
                current: None,
                voice_options: VoiceOptions::default(),
                volume: 1.0,
                filters: FilterSet::new(),
                generation: 0,
                signal_tx: Some(signal_tx),
                watcher: None,
            },
            signal_rx,
        )
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == SessionState::Playing
    }

    /// Generation of the most recent `play` call
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn volume_ratio(&self) -> f64 {
        self.volume
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    /// Listener count of the attached channel, 0 when not connected
    pub fn listeners(&self) -> usize {
        self.connection.as_ref().map_or(0, |c| c.listeners())
    }

    /// Start playing `source`, replacing any live resource.
    ///
    /// The replaced resource emits no natural-end signal. Fails with
    /// `ResourceUnavailable` when the factory cannot produce a resource or
    /// the resource does not reach the playing state in time, and with
    /// `ConnectionFailed` when a fresh transport does not become ready
    /// within the configured bound.
    pub async fn play(&mut self, source: &SourceDescriptor, options: &PlayOptions) -> Result<()> {
        if self.state == SessionState::Destroyed {
            return Err(Error::SessionNotFound(self.channel.to_string()));
        }

        self.generation += 1;
        let generation = self.generation;
        self.stop_current();
        self.state = SessionState::Connecting;

        let resource = match self
            .factory
            .create(
                source,
                self.filters.args(),
                options.quality,
                options.audio_type(),
            )
            .await
        {
            Ok(resource) => resource,
            Err(e) => {
                self.state = SessionState::Idle;
                // Encoder failures carry their own variant; everything
                // else the factory reports becomes ResourceUnavailable.
                return Err(match e {
                    Error::Encoder(_) => e,
                    e => Error::ResourceUnavailable(format!("{}: {}", source.reference, e)),
                });
            }
        };

        let playing_timeout = match source.kind {
            TrackKind::Direct => self.config.direct_playing_timeout,
            TrackKind::RemoteItem => self.config.remote_playing_timeout,
        };
        match timeout(playing_timeout, resource.wait_playing()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                resource.abort();
                self.state = SessionState::Idle;
                return Err(Error::ResourceUnavailable(format!(
                    "{}: {}",
                    source.reference, e
                )));
            }
            Err(_) => {
                resource.abort();
                self.state = SessionState::Idle;
                return Err(Error::ResourceUnavailable(format!(
                    "{}: did not reach playing state within {:?}",
                    source.reference, playing_timeout
                )));
            }
        }
        resource.set_volume(self.volume);

        if self.connection.is_none() {
            self.voice_options = options.voice_options();
            if let Err(e) = self.open_connection(self.config.connect_timeout).await {
                resource.abort();
                self.state = SessionState::Idle;
                return Err(e);
            }
        }

        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| Error::ConnectionFailed("no live connection".into()))?;
        if let Err(e) = connection.subscribe(Arc::clone(&resource)).await {
            resource.abort();
            self.state = SessionState::Idle;
            return Err(Error::ConnectionFailed(e.to_string()));
        }

        debug!(channel = %self.channel, reference = %source.reference, "subscribed resource");

        // Watch for the organic end of this exact play generation.
        if let Some(tx) = self.signal_tx.clone() {
            let watched = Arc::clone(&resource);
            self.watcher = Some(tokio::spawn(async move {
                watched.wait_ended().await;
                let _ = tx.send(SessionSignal::Ended { generation });
            }));
        }

        self.resource = Some(resource);
        self.current = Some((source.clone(), options.clone()));
        self.state = SessionState::Playing;
        Ok(())
    }

    /// Replay the current source with the current filter list.
    ///
    /// Filter changes restart the track from the beginning; position is
    /// not preserved.
    pub async fn replay_current(&mut self) -> Result<()> {
        let Some((source, options)) = self.current.clone() else {
            return Ok(());
        };
        self.play(&source, &options).await
    }

    /// Pause the live resource. Returns false (and does nothing) when
    /// nothing is playing.
    pub async fn pause(&mut self) -> Result<bool> {
        if self.state != SessionState::Playing || self.resource.is_none() {
            return Ok(false);
        }
        if let Some(connection) = self.connection.as_mut() {
            connection
                .set_paused(true)
                .await
                .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        }
        self.state = SessionState::Paused;
        Ok(true)
    }

    /// Resume a paused resource. Returns false when nothing is paused.
    pub async fn resume(&mut self) -> Result<bool> {
        if self.state != SessionState::Paused {
            return Ok(false);
        }
        if let Some(connection) = self.connection.as_mut() {
            connection
                .set_paused(false)
                .await
                .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        }
        self.state = SessionState::Playing;
        Ok(true)
    }

    /// Apply a normalized volume ratio to this and subsequent resources.
    pub fn set_volume(&mut self, ratio: f64) {
        self.volume = ratio;
        if let Some(resource) = &self.resource {
            resource.set_volume(ratio);
        }
    }

    /// Add filter arguments; restarts the current track if one is live.
    pub async fn add_filters<I, S>(&mut self, filters: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let changed = self.filters.add(filters);
        if changed && self.is_playing() {
            self.replay_current().await?;
        }
        Ok(())
    }

    /// Remove filter arguments; restarts the current track if one is live.
    pub async fn remove_filters<I, S>(&mut self, filters: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let changed = self.filters.remove(filters);
        if changed && self.is_playing() {
            self.replay_current().await?;
        }
        Ok(())
    }

    /// Tear the transport down but keep the live resource; a later
    /// `reconnect` re-subscribes it.
    pub async fn disconnect(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.disconnect().await;
        }
        if self.state != SessionState::Destroyed {
            self.state = SessionState::Disconnected;
        }
        info!(channel = %self.channel, "disconnected");
    }

    /// Destroy the current connection, wait, and open a fresh one with the
    /// same voice parameters, re-subscribing the live resource if any.
    pub async fn reconnect(&mut self, delay: Option<Duration>) -> Result<()> {
        if self.state == SessionState::Destroyed {
            return Err(Error::SessionNotFound(self.channel.to_string()));
        }
        if let Some(mut connection) = self.connection.take() {
            connection.destroy().await;
        }
        self.state = SessionState::Connecting;
        sleep(delay.unwrap_or(self.config.reconnect_delay)).await;

        self.open_connection(self.config.connect_timeout)
            .await
            .map_err(|e| {
                self.state = SessionState::Disconnected;
                Error::ReconnectFailed(e.to_string())
            })?;

        if let Some(resource) = self.resource.clone() {
            let connection = self
                .connection
                .as_mut()
                .ok_or_else(|| Error::ReconnectFailed("no live connection".into()))?;
            connection
                .subscribe(resource)
                .await
                .map_err(|e| Error::ReconnectFailed(e.to_string()))?;
            self.state = SessionState::Playing;
        } else {
            self.state = SessionState::Idle;
        }
        info!(channel = %self.channel, "reconnected");
        Ok(())
    }

    /// Tear everything down. Terminal: the session is unusable afterward.
    pub async fn destroy(&mut self) {
        self.stop_current();
        if let Some(mut connection) = self.connection.take() {
            connection.destroy().await;
        }
        self.current = None;
        self.signal_tx = None;
        self.state = SessionState::Destroyed;
        info!(channel = %self.channel, "session destroyed");
    }

    /// Silently release the live resource and its watcher.
    fn stop_current(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        if let Some(resource) = self.resource.take() {
            resource.abort();
        }
    }

    async fn open_connection(&mut self, ready_timeout: Duration) -> Result<()> {
        let mut connection = self
            .connector
            .open(&self.channel, &self.voice_options)
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        match timeout(ready_timeout, connection.ready()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                connection.destroy().await;
                warn!(channel = %self.channel, error = %e, "connection refused");
                return Err(Error::ConnectionFailed(e.to_string()));
            }
            Err(_) => {
                connection.destroy().await;
                warn!(channel = %self.channel, "connection not ready in time");
                return Err(Error::ConnectionFailed(format!(
                    "not ready within {:?}",
                    ready_timeout
                )));
            }
        }
        self.connection = Some(connection);
        Ok(())
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}
