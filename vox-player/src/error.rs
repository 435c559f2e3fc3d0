//! Error types for vox-player
//!
//! Defines engine error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for the vox playback engine
#[derive(Error, Debug)]
pub enum Error {
    /// A direct reference did not parse as a well-formed locator
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// A remote playlist could not be fetched (not found or not public)
    #[error("Playlist unavailable: {0}")]
    PlaylistUnavailable(String),

    /// The resource factory could not produce a playable resource
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// The transport connection did not reach a ready state in time
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A reconnect attempt did not reach a ready state in time
    #[error("Reconnect failed: {0}")]
    ReconnectFailed(String),

    /// Volume outside the 0-10 scale, or a ratio with numerator > denominator
    #[error("Invalid volume: {0}")]
    InvalidVolume(String),

    /// Loop mode outside {0, 1, 2}
    #[error("Invalid loop mode: {0}")]
    InvalidLoopMode(u8),

    /// No queued track matches the given reference
    #[error("Track not found in queue: {0}")]
    TrackNotFound(String),

    /// Operation requires a channel session that does not exist
    #[error("No session for channel: {0}")]
    SessionNotFound(String),

    /// The encoding pipeline behind the resource factory failed. Reported
    /// by `ResourceFactory` implementations and surfaced verbatim by the
    /// session, where other factory failures become `ResourceUnavailable`.
    #[error("Encoder error: {0}")]
    Encoder(String),

    /// Failure reported by an injected driver (transport or metadata)
    #[error("Driver error: {0}")]
    Driver(String),
}

/// Convenience Result type using the vox-player Error
pub type Result<T> = std::result::Result<T, Error>;
