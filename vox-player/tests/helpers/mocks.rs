//! Mock driver implementations for integration tests
//!
//! The mocks are deterministic and instant: connections are ready
//! immediately, resources enter the playing state immediately, and a
//! track's natural end is triggered explicitly with
//! [`MockResource::finish`] (or [`MockFactory::finish_current`]).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Notify};
use tokio::time::timeout;

use vox_common::{ChannelId, Quality, VoxEvent};
use vox_player::config::{PlayerConfig, VoiceOptions};
use vox_player::driver::{
    Connection, Connector, MediaResource, MetadataService, PlaylistEntry, RemoteTrackInfo,
    ResourceFactory, SourceDescriptor,
};
use vox_player::error::{Error, Result};
use vox_player::playback::AudioManager;

// ========================================
// Resources
// ========================================

/// A playable resource whose lifecycle the test controls
pub struct MockResource {
    pub reference: String,
    pub filters: Vec<String>,
    pub quality: Quality,
    volume: StdMutex<f64>,
    ended: Notify,
    aborted: AtomicBool,
}

impl MockResource {
    /// Trigger the natural end of this resource
    pub fn finish(&self) {
        self.ended.notify_one();
    }

    pub fn volume(&self) -> f64 {
        *self.volume.lock().unwrap()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaResource for MockResource {
    async fn wait_playing(&self) -> Result<()> {
        Ok(())
    }

    async fn wait_ended(&self) {
        self.ended.notified().await;
    }

    fn set_volume(&self, ratio: f64) {
        *self.volume.lock().unwrap() = ratio;
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }
}

/// Resource factory producing [`MockResource`]s, with per-reference
/// failure injection
#[derive(Default)]
pub struct MockFactory {
    created: StdMutex<Vec<Arc<MockResource>>>,
    fail_refs: StdMutex<HashSet<String>>,
    encoder_fail_refs: StdMutex<HashSet<String>>,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `create` fail for this reference
    pub fn fail_for(&self, reference: &str) {
        self.fail_refs.lock().unwrap().insert(reference.to_string());
    }

    /// Make `create` fail for this reference with an encoder error
    pub fn fail_encoder_for(&self, reference: &str) {
        self.encoder_fail_refs
            .lock()
            .unwrap()
            .insert(reference.to_string());
    }

    pub fn clear_failures(&self) {
        self.fail_refs.lock().unwrap().clear();
    }

    /// Total number of resources created so far
    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    /// The most recently created resource
    pub fn current(&self) -> Arc<MockResource> {
        self.created
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no resource created yet")
    }

    pub fn resource_at(&self, index: usize) -> Arc<MockResource> {
        self.created.lock().unwrap()[index].clone()
    }

    /// Trigger the natural end of the most recently created resource
    pub fn finish_current(&self) {
        self.current().finish();
    }
}

#[async_trait]
impl ResourceFactory for MockFactory {
    async fn create(
        &self,
        source: &SourceDescriptor,
        filters: &[String],
        quality: Quality,
        _audio_type: &str,
    ) -> Result<Arc<dyn MediaResource>> {
        if self.fail_refs.lock().unwrap().contains(&source.reference) {
            return Err(Error::Driver(format!(
                "no stream for {}",
                source.reference
            )));
        }
        if self
            .encoder_fail_refs
            .lock()
            .unwrap()
            .contains(&source.reference)
        {
            return Err(Error::Encoder(format!(
                "pipeline died for {}",
                source.reference
            )));
        }
        let resource = Arc::new(MockResource {
            reference: source.reference.clone(),
            filters: filters.to_vec(),
            quality,
            volume: StdMutex::new(1.0),
            ended: Notify::new(),
            aborted: AtomicBool::new(false),
        });
        self.created.lock().unwrap().push(Arc::clone(&resource));
        Ok(resource)
    }
}

// ========================================
// Transport
// ========================================

/// Connector handing out instantly-ready [`MockConnection`]s
pub struct MockConnector {
    /// Listener count reported by every connection this connector opens
    pub listeners: Arc<AtomicUsize>,
    fail_open: AtomicBool,
    open_count: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            listeners: Arc::new(AtomicUsize::new(1)),
            fail_open: AtomicBool::new(false),
            open_count: AtomicUsize::new(0),
        })
    }

    pub fn set_listeners(&self, count: usize) {
        self.listeners.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Number of connections opened so far
    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(
        &self,
        channel: &ChannelId,
        _options: &VoiceOptions,
    ) -> Result<Box<dyn Connection>> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(Error::Driver(format!("connect refused for {}", channel)));
        }
        self.open_count.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            listeners: Arc::clone(&self.listeners),
            paused: AtomicBool::new(false),
            subscribed: StdMutex::new(None),
        }))
    }
}

pub struct MockConnection {
    listeners: Arc<AtomicUsize>,
    paused: AtomicBool,
    subscribed: StdMutex<Option<Arc<dyn MediaResource>>>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn ready(&mut self) -> Result<()> {
        Ok(())
    }

    async fn subscribe(&mut self, resource: Arc<dyn MediaResource>) -> Result<()> {
        *self.subscribed.lock().unwrap() = Some(resource);
        Ok(())
    }

    async fn set_paused(&mut self, paused: bool) -> Result<()> {
        self.paused.store(paused, Ordering::SeqCst);
        Ok(())
    }

    fn listeners(&self) -> usize {
        self.listeners.load(Ordering::SeqCst)
    }

    async fn disconnect(&mut self) {
        *self.subscribed.lock().unwrap() = None;
    }

    async fn destroy(&mut self) {
        *self.subscribed.lock().unwrap() = None;
    }
}

// ========================================
// Metadata
// ========================================

/// Metadata service with registered items and playlists; everything else
/// classifies as a direct stream
#[derive(Default)]
pub struct MockMetadata {
    items: StdMutex<HashSet<String>>,
    playlists: StdMutex<HashMap<String, Vec<PlaylistEntry>>>,
    info_failures: StdMutex<HashSet<String>>,
    playlist_failures: StdMutex<HashSet<String>>,
    info_gate: StdMutex<Option<Arc<Notify>>>,
}

impl MockMetadata {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a reference as a single remote item with fetchable
    /// metadata
    pub fn add_item(&self, reference: &str) {
        self.items.lock().unwrap().insert(reference.to_string());
    }

    /// Register a playlist and its members (members also become items)
    pub fn add_playlist(&self, reference: &str, members: &[&str]) {
        let entries = members
            .iter()
            .map(|member| PlaylistEntry {
                reference: member.to_string(),
                info: Some(item_info(member)),
            })
            .collect();
        self.playlists
            .lock()
            .unwrap()
            .insert(reference.to_string(), entries);
        for member in members {
            self.add_item(member);
        }
    }

    /// Make `get_info` fail for this reference (classification unchanged)
    pub fn fail_info(&self, reference: &str) {
        self.info_failures
            .lock()
            .unwrap()
            .insert(reference.to_string());
    }

    /// Hold every `get_info` call until the returned handle is notified,
    /// suspending resolution mid-flight
    pub fn gate_info(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.info_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Register a reference that matches the playlist grammar but whose
    /// fetch fails (private or deleted list)
    pub fn fail_playlist(&self, reference: &str) {
        self.playlist_failures
            .lock()
            .unwrap()
            .insert(reference.to_string());
    }
}

fn item_info(reference: &str) -> RemoteTrackInfo {
    RemoteTrackInfo {
        title: format!("Title: {}", reference),
        thumbnail: None,
        duration_seconds: Some(180),
    }
}

#[async_trait]
impl MetadataService for MockMetadata {
    async fn get_info(&self, reference: &str) -> Result<RemoteTrackInfo> {
        let gate = self.info_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.info_failures.lock().unwrap().contains(reference) {
            return Err(Error::Driver(format!("metadata unavailable: {}", reference)));
        }
        if self.items.lock().unwrap().contains(reference) {
            Ok(item_info(reference))
        } else {
            Err(Error::Driver(format!("unknown item: {}", reference)))
        }
    }

    async fn get_playlist(&self, reference: &str) -> Result<Vec<PlaylistEntry>> {
        if self.playlist_failures.lock().unwrap().contains(reference) {
            return Err(Error::Driver(format!("playlist not public: {}", reference)));
        }
        self.playlists
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .ok_or_else(|| Error::Driver(format!("unknown playlist: {}", reference)))
    }

    fn is_item_reference(&self, reference: &str) -> bool {
        self.items.lock().unwrap().contains(reference)
    }

    fn is_playlist_reference(&self, reference: &str) -> bool {
        self.playlists.lock().unwrap().contains_key(reference)
            || self.playlist_failures.lock().unwrap().contains(reference)
    }
}

// ========================================
// Harness
// ========================================

pub struct TestHarness {
    pub manager: AudioManager,
    pub connector: Arc<MockConnector>,
    pub factory: Arc<MockFactory>,
    pub metadata: Arc<MockMetadata>,
}

/// An AudioManager wired to the mock drivers with short timeouts
pub fn harness() -> TestHarness {
    let connector = MockConnector::new();
    let factory = MockFactory::new();
    let metadata = MockMetadata::new();
    let config = PlayerConfig {
        connect_timeout: Duration::from_millis(200),
        direct_playing_timeout: Duration::from_millis(200),
        remote_playing_timeout: Duration::from_millis(200),
        reconnect_delay: Duration::from_millis(10),
        event_capacity: 64,
    };
    let manager = AudioManager::new(
        Arc::clone(&connector) as Arc<dyn Connector>,
        Arc::clone(&factory) as Arc<dyn ResourceFactory>,
        Arc::clone(&metadata) as Arc<dyn MetadataService>,
        config,
    );
    TestHarness {
        manager,
        connector,
        factory,
        metadata,
    }
}

/// Receive events until one matches, or panic after one second
pub async fn expect_event(
    rx: &mut broadcast::Receiver<VoxEvent>,
    matches: impl Fn(&VoxEvent) -> bool,
) -> VoxEvent {
    timeout(Duration::from_secs(1), async {
        loop {
            match rx.recv().await {
                Ok(event) if matches(&event) => return event,
                Ok(_) => continue,
                Err(e) => panic!("event stream closed: {}", e),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Give the engine's driver tasks a chance to run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
