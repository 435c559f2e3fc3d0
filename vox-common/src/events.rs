//! Event types and distribution for the vox playback engine
//!
//! Provides the shared `VoxEvent` definitions and the `EventBus`.
//!
//! # Architecture
//!
//! Vox uses hybrid communication:
//! - **EventBus** (tokio::broadcast): one-to-many event broadcasting
//! - **Signal channels** (tokio::mpsc): playback session -> engine
//! - **Shared state** (Mutex-guarded session interiors): serialized access
//!
//! Events carry display projections (`TrackInfo`), never live playback
//! handles, so they can be serialized and forwarded to any frontend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{ChannelId, TrackInfo};

/// Events emitted by the playback engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VoxEvent {
    /// A track started playing on a channel
    Play {
        channel: ChannelId,
        track: TrackInfo,
        timestamp: DateTime<Utc>,
    },

    /// A track was appended to an already-active queue
    QueueAdd {
        channel: ChannelId,
        track: TrackInfo,
        timestamp: DateTime<Utc>,
    },

    /// A track was removed from the queue without being played
    QueueRemove {
        channel: ChannelId,
        track: TrackInfo,
        timestamp: DateTime<Utc>,
    },

    /// The queue emptied after a natural completion; the channel session
    /// was torn down
    End {
        channel: ChannelId,
        timestamp: DateTime<Utc>,
    },

    /// A non-fatal failure during automatic queue advancement
    Error {
        channel: ChannelId,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// The transport connection for a channel was lost
    Disconnect {
        channel: ChannelId,
        timestamp: DateTime<Utc>,
    },

    /// A channel session was explicitly stopped and its connection destroyed
    ConnectionDestroy {
        channel: ChannelId,
        timestamp: DateTime<Utc>,
    },

    /// The whole engine was shut down (every session torn down)
    Destroy { timestamp: DateTime<Utc> },
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for engine-wide events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<VoxEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<VoxEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: VoxEvent) -> Result<usize, broadcast::error::SendError<VoxEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Useful for non-critical events where it's acceptable if no component
    /// is currently observing the engine.
    pub fn emit_lossy(&self, event: VoxEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event emitted with no subscribers");
        }
    }

    /// Number of currently attached subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
