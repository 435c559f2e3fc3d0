//! # Vox Common Library
//!
//! Shared code for the vox playback engine:
//! - Event types (VoxEvent enum) and the EventBus
//! - Channel identity and queue vocabulary (ChannelId, LoopMode, Quality, TrackInfo)

pub mod events;
pub mod types;

pub use events::{EventBus, VoxEvent};
pub use types::{ChannelId, LoopMode, Quality, TrackInfo, TrackKind};
