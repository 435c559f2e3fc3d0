//! Track data model and playback-timeline bookkeeping

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

use vox_common::{LoopMode, Quality, TrackInfo, TrackKind};

use crate::config::PlayOptions;
use crate::driver::SourceDescriptor;

/// One interval during which the track was paused.
///
/// `end` stays open while the pause is ongoing; resuming closes it.
#[derive(Debug, Clone, PartialEq)]
pub struct PauseInterval {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

/// One queued playable item
///
/// `reference` and `title` are immutable after creation; the timeline
/// fields (`started_at`, `paused`, `pause_intervals`) are mutated only
/// while the track is the head of its queue and attached to a live
/// playback session.
#[derive(Debug, Clone)]
pub struct Track {
    pub reference: String,
    pub kind: TrackKind,
    pub title: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub quality: Quality,
    pub audio_type: String,
    /// Volume ratio in [0, 1] the track starts with
    pub volume: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub paused: bool,
    pub pause_intervals: Vec<PauseInterval>,
    /// Loop mode in effect when this track was enqueued; `previous()`
    /// restores it
    pub loop_mode_at_enqueue: LoopMode,
}

impl Track {
    pub fn new(
        reference: String,
        kind: TrackKind,
        options: &PlayOptions,
        volume: f64,
        loop_mode: LoopMode,
    ) -> Self {
        Self {
            reference,
            kind,
            title: None,
            metadata: None,
            quality: options.quality,
            audio_type: options.audio_type().to_string(),
            volume,
            started_at: None,
            paused: false,
            pause_intervals: Vec::new(),
            loop_mode_at_enqueue: loop_mode,
        }
    }

    pub fn source(&self) -> SourceDescriptor {
        SourceDescriptor {
            reference: self.reference.clone(),
            kind: self.kind,
        }
    }

    pub fn info(&self) -> TrackInfo {
        TrackInfo {
            reference: self.reference.clone(),
            title: self.title.clone(),
        }
    }

    /// Clear all timeline bookkeeping (queue-loop re-enqueue, replay via
    /// `previous`, displaced head).
    pub fn reset_timeline(&mut self) {
        self.started_at = None;
        self.paused = false;
        self.pause_intervals.clear();
    }

    /// Mark the track as started now.
    pub fn mark_started(&mut self, now: DateTime<Utc>) {
        self.reset_timeline();
        self.started_at = Some(now);
    }

    /// Open a pause interval. No-op if already paused or never started.
    pub fn record_pause(&mut self, now: DateTime<Utc>) {
        if self.paused || self.started_at.is_none() {
            return;
        }
        self.paused = true;
        self.pause_intervals.push(PauseInterval {
            start: now,
            end: None,
        });
    }

    /// Close the most recent open pause interval. No-op if not paused.
    pub fn record_resume(&mut self, now: DateTime<Utc>) {
        if !self.paused {
            return;
        }
        self.paused = false;
        if let Some(interval) = self.pause_intervals.last_mut() {
            if interval.end.is_none() {
                interval.end = Some(now);
            }
        }
    }

    /// Wall-clock time this track has actually been audible: time since
    /// `started_at` minus every pause interval (an open interval counts up
    /// to `now`).
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let Some(started_at) = self.started_at else {
            return Duration::ZERO;
        };
        let mut elapsed = now.signed_duration_since(started_at);
        for interval in &self.pause_intervals {
            let end = interval.end.unwrap_or(now);
            elapsed = elapsed - end.signed_duration_since(interval.start);
        }
        elapsed
            .max(ChronoDuration::zero())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Snapshot of the currently playing track for display
#[derive(Debug, Clone)]
pub struct CurrentSong {
    pub reference: String,
    pub title: Option<String>,
    /// Audible time, pauses excluded
    pub elapsed: Duration,
    pub paused: bool,
}
