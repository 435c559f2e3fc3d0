//! Queue engine and channel registry
//!
//! `AudioManager` is the public face of the crate: it maps channel
//! identities to their channel sessions, serializes every operation on a
//! channel behind that session's mutex, and drives each playback session
//! forward on natural track completion.
//!
//! Natural-end advancement runs in a per-session driver task draining the
//! session's signal channel. The handler runs to completion under the
//! session mutex, so an explicit `skip`/`previous`/`play` issued while a
//! track is ending observes either the pre-advance or the post-advance
//! queue, never an intermediate shape.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use vox_common::{ChannelId, EventBus, LoopMode, TrackInfo, VoxEvent};

use crate::config::{NoListenersBehavior, PlayOptions, PlayerConfig};
use crate::driver::{Connector, MetadataService, ResourceFactory};
use crate::error::{Error, Result};
use crate::playback::queue::TrackQueue;
use crate::playback::session::{PlaybackSession, SessionSignal};
use crate::playback::types::{CurrentSong, Track};
use crate::resolver::Resolver;
use crate::volume::VolumeSpec;

/// Mutable per-channel state, serialized behind the entry mutex
struct SessionInner {
    session: PlaybackSession,
    queue: TrackQueue,
    loop_mode: LoopMode,
    /// Options of the most recent `play` call; supplies the listener
    /// policy for subsequent transitions
    options: PlayOptions,
}

/// Registry entry for one channel
///
/// The `session_id` identifies this incarnation of the channel session.
/// Continuations that re-acquire the mutex after an await compare it
/// against the registry; a mismatch means the session was torn down (and
/// possibly recreated) in the meantime and the result must be discarded.
struct ChannelEntry {
    session_id: Uuid,
    inner: Mutex<SessionInner>,
}

/// Event the teardown path emits once the session is gone
#[derive(Clone, Copy)]
enum TeardownCause {
    /// Queue emptied after a natural completion (or advancement exhausted
    /// the queue without starting anything)
    QueueFinished,
    /// Caller-initiated stop
    Stopped,
}

/// Per-channel playback queue manager
///
/// Cheap to clone; clones share the registry, drivers, and event bus.
#[derive(Clone)]
pub struct AudioManager {
    registry: Arc<RwLock<HashMap<ChannelId, Arc<ChannelEntry>>>>,
    /// Bumped by `destroy_all` under the registry write lock. An initial
    /// play whose resolution straddled the bump fails registration instead
    /// of planting a live session after shutdown.
    epoch: Arc<AtomicU64>,
    connector: Arc<dyn Connector>,
    factory: Arc<dyn ResourceFactory>,
    resolver: Resolver,
    events: EventBus,
    config: PlayerConfig,
}

impl AudioManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        factory: Arc<dyn ResourceFactory>,
        metadata: Arc<dyn MetadataService>,
        config: PlayerConfig,
    ) -> Self {
        info!("Creating audio manager");
        Self {
            registry: Arc::new(RwLock::new(HashMap::new())),
            epoch: Arc::new(AtomicU64::new(0)),
            connector,
            factory,
            resolver: Resolver::new(metadata),
            events: EventBus::new(config.event_capacity),
            config,
        }
    }

    /// Subscribe to engine events
    pub fn subscribe(&self) -> broadcast::Receiver<VoxEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // ========================================
    // Playback operations
    // ========================================

    /// Resolve `reference` and play or enqueue it on `channel`.
    ///
    /// Returns `true` when the resolved tracks were appended to an
    /// already-active queue, `false` when a new session started playing
    /// immediately. An initial play that fails leaves no channel session
    /// behind; an append that fails leaves the playing session untouched.
    pub async fn play(
        &self,
        channel: &ChannelId,
        reference: &str,
        options: PlayOptions,
    ) -> Result<bool> {
        let volume = match &options.volume {
            Some(spec) => spec.normalize()?,
            None => 1.0,
        };

        loop {
            if let Some(entry) = self.lookup(channel).await {
                let mut inner = entry.inner.lock().await;
                if !self.is_live(channel, entry.session_id).await {
                    // Torn down between lookup and lock; start fresh.
                    continue;
                }
                let tracks = self
                    .resolver
                    .resolve(reference, &options, volume, inner.loop_mode)
                    .await?;
                let now = Utc::now();
                for track in tracks {
                    self.events.emit_lossy(VoxEvent::QueueAdd {
                        channel: channel.clone(),
                        track: track.info(),
                        timestamp: now,
                    });
                    inner.queue.push_back(track);
                }
                inner.options = options;
                debug!(channel = %channel, queued = inner.queue.len(), "appended to queue");
                return Ok(true);
            }

            match self
                .start_session(channel, reference, options.clone(), volume)
                .await?
            {
                Some(appended) => return Ok(appended),
                // Lost the registration race; append to the winner.
                None => continue,
            }
        }
    }

    /// Advance past the current head, honoring the loop mode, and start
    /// the resulting head. An emptied queue delegates to `stop`.
    pub async fn skip(&self, channel: &ChannelId) -> Result<()> {
        let entry = self.entry(channel).await?;
        let mut inner = entry.inner.lock().await;
        self.check_live(channel, entry.session_id).await?;

        debug!(channel = %channel, mode = ?inner.loop_mode, "skip");
        Self::rotate_head(&mut inner);
        if inner.queue.is_empty() {
            self.teardown_locked(channel, &mut inner, TeardownCause::Stopped)
                .await;
            return Ok(());
        }
        if self.start_next(channel, &mut inner).await {
            self.apply_listener_policy(channel, &mut inner).await;
        } else {
            self.teardown_locked(channel, &mut inner, TeardownCause::QueueFinished)
                .await;
        }
        Ok(())
    }

    /// Re-insert the most recently completed track at the queue head and
    /// play it. With an empty history the current head replays.
    pub async fn previous(&self, channel: &ChannelId) -> Result<()> {
        let entry = self.entry(channel).await?;
        let mut inner = entry.inner.lock().await;
        self.check_live(channel, entry.session_id).await?;

        if let Some(mut track) = inner.queue.pop_previous() {
            // A queue-looped completion left a copy at the tail; take it
            // back out so skip -> previous -> skip round-trips preserve
            // the queue shape.
            if track.loop_mode_at_enqueue == LoopMode::Queue {
                inner.queue.drop_tail_copy(&track.reference);
            }
            track.reset_timeline();
            if let Some(head) = inner.queue.head_mut() {
                head.reset_timeline();
            }
            inner.loop_mode = track.loop_mode_at_enqueue;
            inner.queue.push_front(track);
        }

        if self.start_next(channel, &mut inner).await {
            self.apply_listener_policy(channel, &mut inner).await;
            Ok(())
        } else {
            self.teardown_locked(channel, &mut inner, TeardownCause::Stopped)
                .await;
            Ok(())
        }
    }

    /// Set the loop mode, stamping it onto every currently queued track.
    pub async fn set_loop(&self, channel: &ChannelId, mode: u8) -> Result<()> {
        let mode = LoopMode::from_index(mode).ok_or(Error::InvalidLoopMode(mode))?;
        let entry = self.entry(channel).await?;
        let mut inner = entry.inner.lock().await;
        self.check_live(channel, entry.session_id).await?;
        inner.loop_mode = mode;
        inner.queue.stamp_loop_mode(mode);
        info!(channel = %channel, ?mode, "loop mode changed");
        Ok(())
    }

    /// Destroy the playback session and delete the channel session.
    pub async fn stop(&self, channel: &ChannelId) -> Result<()> {
        let entry = self.entry(channel).await?;
        let mut inner = entry.inner.lock().await;
        self.check_live(channel, entry.session_id).await?;
        self.teardown_locked(channel, &mut inner, TeardownCause::Stopped)
            .await;
        Ok(())
    }

    /// Pause playback, opening a pause interval on the head track.
    pub async fn pause(&self, channel: &ChannelId) -> Result<()> {
        let entry = self.entry(channel).await?;
        let mut inner = entry.inner.lock().await;
        if inner.session.pause().await? {
            let now = Utc::now();
            if let Some(head) = inner.queue.head_mut() {
                head.record_pause(now);
            }
        }
        Ok(())
    }

    /// Resume playback, closing the head track's open pause interval.
    pub async fn resume(&self, channel: &ChannelId) -> Result<()> {
        let entry = self.entry(channel).await?;
        let mut inner = entry.inner.lock().await;
        if inner.session.resume().await? {
            let now = Utc::now();
            if let Some(head) = inner.queue.head_mut() {
                head.record_resume(now);
            }
        }
        Ok(())
    }

    // ========================================
    // Queue inspection and editing
    // ========================================

    /// Read-only projection of the queue in play order.
    pub async fn queue(&self, channel: &ChannelId) -> Result<Vec<TrackInfo>> {
        let entry = self.entry(channel).await?;
        let inner = entry.inner.lock().await;
        Ok(inner.queue.infos())
    }

    /// Drop every queued track except the playing head.
    pub async fn clear_queue(&self, channel: &ChannelId) -> Result<()> {
        let entry = self.entry(channel).await?;
        let mut inner = entry.inner.lock().await;
        inner.queue.clear_pending();
        Ok(())
    }

    /// Remove the first non-head track matching `reference`.
    pub async fn delete_from_queue(&self, channel: &ChannelId, reference: &str) -> Result<()> {
        let entry = self.entry(channel).await?;
        let mut inner = entry.inner.lock().await;
        match inner.queue.remove_by_reference(reference) {
            Some(track) => {
                self.events.emit_lossy(VoxEvent::QueueRemove {
                    channel: channel.clone(),
                    track: track.info(),
                    timestamp: Utc::now(),
                });
                Ok(())
            }
            None => Err(Error::TrackNotFound(reference.to_string())),
        }
    }

    /// Randomly permute every queued track except the playing head.
    pub async fn shuffle(&self, channel: &ChannelId) -> Result<()> {
        let entry = self.entry(channel).await?;
        let mut inner = entry.inner.lock().await;
        {
            let mut rng = rand::thread_rng();
            inner.queue.shuffle_pending(&mut rng);
        }
        Ok(())
    }

    /// The head track with its audible elapsed time, pauses excluded.
    pub async fn get_current_song(&self, channel: &ChannelId) -> Result<CurrentSong> {
        let entry = self.entry(channel).await?;
        let inner = entry.inner.lock().await;
        let head = inner
            .queue
            .head()
            .ok_or_else(|| Error::SessionNotFound(channel.to_string()))?;
        Ok(CurrentSong {
            reference: head.reference.clone(),
            title: head.title.clone(),
            elapsed: head.elapsed(Utc::now()),
            paused: head.paused,
        })
    }

    // ========================================
    // Volume and filters
    // ========================================

    /// Current volume as a normalized ratio.
    pub async fn get_volume(&self, channel: &ChannelId) -> Result<f64> {
        let entry = self.entry(channel).await?;
        let inner = entry.inner.lock().await;
        Ok(inner.session.volume_ratio())
    }

    /// Set the channel volume, applied to the live resource and stamped
    /// onto every queued track. Level input must be in 1-10.
    pub async fn set_volume(&self, channel: &ChannelId, spec: VolumeSpec) -> Result<()> {
        if matches!(spec, VolumeSpec::Level(0)) {
            return Err(Error::InvalidVolume(
                "volume level must be between 1 and 10".to_string(),
            ));
        }
        let ratio = spec.normalize()?;
        let entry = self.entry(channel).await?;
        let mut inner = entry.inner.lock().await;
        inner.session.set_volume(ratio);
        inner.queue.stamp_volume(ratio);
        Ok(())
    }

    /// Add filter arguments; restarts the current track if one is live.
    pub async fn set_filter(&self, channel: &ChannelId, filters: Vec<String>) -> Result<()> {
        let entry = self.entry(channel).await?;
        let mut inner = entry.inner.lock().await;
        inner.session.add_filters(filters).await
    }

    /// Remove filter arguments; default arguments are protected.
    pub async fn remove_filter(&self, channel: &ChannelId, filters: Vec<String>) -> Result<()> {
        let entry = self.entry(channel).await?;
        let mut inner = entry.inner.lock().await;
        inner.session.remove_filters(filters).await
    }

    /// The channel's current filter-argument list.
    pub async fn get_filters(&self, channel: &ChannelId) -> Result<Vec<String>> {
        let entry = self.entry(channel).await?;
        let inner = entry.inner.lock().await;
        Ok(inner.session.filters().to_vec())
    }

    // ========================================
    // Connection management
    // ========================================

    /// Destroy the current connection, wait `delay` (default 2000ms), and
    /// open a fresh one, re-subscribing the live resource.
    pub async fn reconnect(&self, channel: &ChannelId, delay: Option<Duration>) -> Result<()> {
        let entry = self.entry(channel).await?;
        let mut inner = entry.inner.lock().await;
        self.check_live(channel, entry.session_id).await?;
        inner.session.reconnect(delay).await
    }

    /// Tear the transport down but keep the channel session for a later
    /// `reconnect`.
    pub async fn disconnect(&self, channel: &ChannelId) -> Result<()> {
        let entry = self.entry(channel).await?;
        let mut inner = entry.inner.lock().await;
        inner.session.disconnect().await;
        self.events.emit_lossy(VoxEvent::Disconnect {
            channel: channel.clone(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Whether the channel currently has a track in the playing state.
    pub async fn is_playing(&self, channel: &ChannelId) -> bool {
        match self.lookup(channel).await {
            Some(entry) => entry.inner.lock().await.session.is_playing(),
            None => false,
        }
    }

    /// Listener count of the channel's transport connection.
    pub async fn get_listeners(&self, channel: &ChannelId) -> Result<usize> {
        let entry = self.entry(channel).await?;
        let inner = entry.inner.lock().await;
        Ok(inner.session.listeners())
    }

    /// Tear down every live session and clear the registry.
    ///
    /// An initial play still resolving when this runs observes the epoch
    /// bump at registration time and fails instead of registering.
    pub async fn destroy_all(&self) {
        info!("Destroying all channel sessions");
        let entries: Vec<_> = {
            let mut registry = self.registry.write().await;
            self.epoch.fetch_add(1, Ordering::SeqCst);
            registry.drain().collect()
        };
        for (channel, entry) in entries {
            let mut inner = entry.inner.lock().await;
            inner.session.destroy().await;
            debug!(channel = %channel, "session torn down");
        }
        self.events.emit_lossy(VoxEvent::Destroy {
            timestamp: Utc::now(),
        });
    }

    // ========================================
    // Internals
    // ========================================

    async fn lookup(&self, channel: &ChannelId) -> Option<Arc<ChannelEntry>> {
        self.registry.read().await.get(channel).cloned()
    }

    async fn entry(&self, channel: &ChannelId) -> Result<Arc<ChannelEntry>> {
        self.lookup(channel)
            .await
            .ok_or_else(|| Error::SessionNotFound(channel.to_string()))
    }

    /// Whether the registry still maps `channel` to this session
    /// incarnation. Continuations call this after re-acquiring the mutex.
    async fn is_live(&self, channel: &ChannelId, session_id: Uuid) -> bool {
        self.registry
            .read()
            .await
            .get(channel)
            .map(|entry| entry.session_id)
            == Some(session_id)
    }

    async fn check_live(&self, channel: &ChannelId, session_id: Uuid) -> Result<()> {
        if self.is_live(channel, session_id).await {
            Ok(())
        } else {
            Err(Error::SessionNotFound(channel.to_string()))
        }
    }

    /// Initial play on a channel with no session: resolve, register, start.
    /// Any failure rolls the registration back completely. Returns `None`
    /// when a concurrent initial play registered first; the caller retries
    /// as an append.
    async fn start_session(
        &self,
        channel: &ChannelId,
        reference: &str,
        options: PlayOptions,
        volume: f64,
    ) -> Result<Option<bool>> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let tracks = self
            .resolver
            .resolve(reference, &options, volume, LoopMode::Off)
            .await?;
        if tracks.is_empty() {
            return Err(Error::InvalidReference(reference.to_string()));
        }

        let (session, signal_rx) = PlaybackSession::new(
            channel.clone(),
            Arc::clone(&self.connector),
            Arc::clone(&self.factory),
            self.config.clone(),
        );
        let mut queue = TrackQueue::new();
        for track in tracks {
            queue.push_back(track);
        }
        let entry = Arc::new(ChannelEntry {
            session_id: Uuid::new_v4(),
            inner: Mutex::new(SessionInner {
                session,
                queue,
                loop_mode: LoopMode::Off,
                options,
            }),
        });

        {
            let mut registry = self.registry.write().await;
            if self.epoch.load(Ordering::SeqCst) != epoch {
                // destroy_all ran while we were resolving; a registration
                // now would resurrect a shut-down engine.
                drop(registry);
                let mut inner = entry.inner.lock().await;
                inner.session.destroy().await;
                return Err(Error::SessionNotFound(channel.to_string()));
            }
            if registry.contains_key(channel) {
                drop(registry);
                let mut inner = entry.inner.lock().await;
                inner.session.destroy().await;
                return Ok(None);
            }
            registry.insert(channel.clone(), Arc::clone(&entry));
        }

        let mut inner = entry.inner.lock().await;
        match self.start_head_or_fail(channel, &mut inner).await {
            Ok(()) => {
                self.apply_listener_policy(channel, &mut inner).await;
                drop(inner);
                self.spawn_driver(channel.clone(), entry, signal_rx);
                Ok(Some(false))
            }
            Err(e) => {
                self.registry.write().await.remove(channel);
                inner.session.destroy().await;
                Err(e)
            }
        }
    }

    /// Start the head track, propagating the first failure to the caller.
    /// Used only on the initial-play path, which must fail loudly instead
    /// of emitting error events.
    async fn start_head_or_fail(&self, channel: &ChannelId, inner: &mut SessionInner) -> Result<()> {
        let (source, play_opts, volume) = match inner.queue.head() {
            Some(head) => (
                head.source(),
                Self::head_options(head, &inner.options),
                head.volume,
            ),
            None => return Err(Error::InvalidReference("empty queue".to_string())),
        };
        inner.session.set_volume(volume);
        inner.session.play(&source, &play_opts).await?;
        self.mark_head_playing(channel, inner);
        Ok(())
    }

    /// Start the head track, trying successive tracks as heads fail.
    /// Failures emit `Error` events and move the failed track to the
    /// history. Returns false when the queue exhausted without starting.
    async fn start_next(&self, channel: &ChannelId, inner: &mut SessionInner) -> bool {
        loop {
            let (source, play_opts, volume) = match inner.queue.head() {
                Some(head) => (
                    head.source(),
                    Self::head_options(head, &inner.options),
                    head.volume,
                ),
                None => return false,
            };
            inner.session.set_volume(volume);
            match inner.session.play(&source, &play_opts).await {
                Ok(()) => {
                    self.mark_head_playing(channel, inner);
                    return true;
                }
                Err(e) => {
                    warn!(channel = %channel, reference = %source.reference, error = %e,
                        "failed to start queued track");
                    self.events.emit_lossy(VoxEvent::Error {
                        channel: channel.clone(),
                        message: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    if let Some(failed) = inner.queue.pop_head() {
                        inner.queue.push_previous(failed);
                    }
                }
            }
        }
    }

    fn mark_head_playing(&self, channel: &ChannelId, inner: &mut SessionInner) {
        let now = Utc::now();
        if let Some(head) = inner.queue.head_mut() {
            head.mark_started(now);
            info!(channel = %channel, reference = %head.reference, "track playing");
        }
        if let Some(head) = inner.queue.head() {
            self.events.emit_lossy(VoxEvent::Play {
                channel: channel.clone(),
                track: head.info(),
                timestamp: now,
            });
        }
    }

    /// Per-track play options: the track's own quality/audio-type over the
    /// channel's remembered option set.
    fn head_options(head: &Track, channel_options: &PlayOptions) -> PlayOptions {
        PlayOptions {
            quality: head.quality,
            audio_type: Some(head.audio_type.clone()),
            volume: None,
            ..channel_options.clone()
        }
    }

    /// Advance the queue past the completed head per the loop mode.
    ///
    /// Off discards the head into the history. Queue re-enqueues a copy
    /// with a reset timeline at the tail and records the original in the
    /// history. Track leaves the head in place for replay.
    fn rotate_head(inner: &mut SessionInner) {
        match inner.loop_mode {
            LoopMode::Off => {
                if let Some(done) = inner.queue.pop_head() {
                    inner.queue.push_previous(done);
                }
            }
            LoopMode::Queue => {
                if let Some(done) = inner.queue.pop_head() {
                    let mut copy = done.clone();
                    copy.reset_timeline();
                    inner.queue.push_back(copy);
                    inner.queue.push_previous(done);
                }
            }
            LoopMode::Track => {}
        }
    }

    /// Natural-end handler; runs under the session mutex in the driver
    /// task.
    async fn handle_track_end(&self, channel: &ChannelId, inner: &mut SessionInner) {
        debug!(channel = %channel, mode = ?inner.loop_mode, "track ended");
        Self::rotate_head(inner);
        if inner.queue.is_empty() {
            self.teardown_locked(channel, inner, TeardownCause::QueueFinished)
                .await;
            return;
        }
        if self.start_next(channel, inner).await {
            self.apply_listener_policy(channel, inner).await;
        } else {
            self.teardown_locked(channel, inner, TeardownCause::QueueFinished)
                .await;
        }
    }

    /// Evaluate the no-listeners policy right after a transition started a
    /// track.
    async fn apply_listener_policy(&self, channel: &ChannelId, inner: &mut SessionInner) {
        if inner.session.listeners() > 0 {
            return;
        }
        let leave =
            inner.options.auto_leave || inner.options.no_listeners == NoListenersBehavior::Leave;
        if leave {
            info!(channel = %channel, "no listeners, leaving");
            self.teardown_locked(channel, inner, TeardownCause::Stopped)
                .await;
            return;
        }
        if inner.options.no_listeners == NoListenersBehavior::Pause {
            if let Ok(true) = inner.session.pause().await {
                let now = Utc::now();
                if let Some(head) = inner.queue.head_mut() {
                    head.record_pause(now);
                }
                info!(channel = %channel, "no listeners, paused");
            }
        }
    }

    /// Remove the channel from the registry and destroy its session.
    /// Callers hold the session mutex; no registry guard is held while a
    /// session mutex is awaited anywhere, so the brief write lock here
    /// cannot deadlock.
    async fn teardown_locked(
        &self,
        channel: &ChannelId,
        inner: &mut SessionInner,
        cause: TeardownCause,
    ) {
        self.registry.write().await.remove(channel);
        inner.session.destroy().await;
        let event = match cause {
            TeardownCause::QueueFinished => VoxEvent::End {
                channel: channel.clone(),
                timestamp: Utc::now(),
            },
            TeardownCause::Stopped => VoxEvent::ConnectionDestroy {
                channel: channel.clone(),
                timestamp: Utc::now(),
            },
        };
        self.events.emit_lossy(event);
        info!(channel = %channel, "channel session removed");
    }

    /// Drain the session's natural-end signals.
    ///
    /// Each signal is validated twice before the queue advances: the
    /// registry must still map the channel to this session incarnation,
    /// and the signal's play generation must match the session's current
    /// one. A mismatch on either means a teardown or a replace won the
    /// race and the signal is discarded.
    fn spawn_driver(
        &self,
        channel: ChannelId,
        entry: Arc<ChannelEntry>,
        mut signal_rx: mpsc::UnboundedReceiver<SessionSignal>,
    ) {
        let manager = self.clone();
        tokio::spawn(async move {
            while let Some(SessionSignal::Ended { generation }) = signal_rx.recv().await {
                let mut inner = entry.inner.lock().await;
                if !manager.is_live(&channel, entry.session_id).await {
                    debug!(channel = %channel, "end signal for torn-down session, discarding");
                    break;
                }
                if generation != inner.session.generation() {
                    debug!(channel = %channel, generation, "stale end signal, discarding");
                    continue;
                }
                manager.handle_track_end(&channel, &mut inner).await;
            }
            debug!(channel = %channel, "driver task exiting");
        });
    }
}
