//! Per-channel track queue and completion history
//!
//! Insertion order is play order; the head is the currently playing (or
//! next-to-play) track. `previous` holds completed tracks in completion
//! order and only ever grows through completion or skip; `pop_previous`
//! takes from its tail.

use rand::seq::SliceRandom;
use std::collections::VecDeque;

use vox_common::{LoopMode, TrackInfo};

use crate::playback::types::Track;

/// Ordered queue plus history for one channel
#[derive(Debug, Default)]
pub struct TrackQueue {
    tracks: VecDeque<Track>,
    previous: Vec<Track>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn head(&self) -> Option<&Track> {
        self.tracks.front()
    }

    pub fn head_mut(&mut self) -> Option<&mut Track> {
        self.tracks.front_mut()
    }

    pub fn push_back(&mut self, track: Track) {
        self.tracks.push_back(track);
    }

    pub fn push_front(&mut self, track: Track) {
        self.tracks.push_front(track);
    }

    pub fn pop_head(&mut self) -> Option<Track> {
        self.tracks.pop_front()
    }

    /// Record a completed (or skipped-past) track in the history.
    pub fn push_previous(&mut self, track: Track) {
        self.previous.push(track);
    }

    /// Take the most recently completed track back out of the history.
    pub fn pop_previous(&mut self) -> Option<Track> {
        self.previous.pop()
    }

    pub fn previous_len(&self) -> usize {
        self.previous.len()
    }

    /// Drop the tail entry if it matches `reference`.
    ///
    /// Used by `previous()` under queue-loop: the completed track left a
    /// copy at the tail when it rotated, and re-inserting it at the head
    /// without dropping that copy would duplicate it.
    pub fn drop_tail_copy(&mut self, reference: &str) -> bool {
        if self
            .tracks
            .back()
            .is_some_and(|t| t.reference == reference)
        {
            self.tracks.pop_back();
            true
        } else {
            false
        }
    }

    /// Remove the first non-head track matching `reference`.
    ///
    /// The playing head is never removed here; that path is `skip`.
    pub fn remove_by_reference(&mut self, reference: &str) -> Option<Track> {
        let index = self
            .tracks
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, t)| t.reference == reference)
            .map(|(i, _)| i)?;
        self.tracks.remove(index)
    }

    /// Drop everything behind the head. The playing track is unaffected.
    pub fn clear_pending(&mut self) {
        self.tracks.truncate(1);
    }

    /// Randomly permute every track except the head.
    pub fn shuffle_pending<R: rand::Rng>(&mut self, rng: &mut R) {
        let slice = self.tracks.make_contiguous();
        if slice.len() > 2 {
            slice[1..].shuffle(rng);
        }
    }

    /// Stamp a loop mode onto every queued track (head included).
    pub fn stamp_loop_mode(&mut self, mode: LoopMode) {
        for track in self.tracks.iter_mut() {
            track.loop_mode_at_enqueue = mode;
        }
    }

    /// Stamp a normalized volume ratio onto every queued track.
    pub fn stamp_volume(&mut self, ratio: f64) {
        for track in self.tracks.iter_mut() {
            track.volume = ratio;
        }
    }

    /// Read-only projection of the queue in play order.
    pub fn infos(&self) -> Vec<TrackInfo> {
        self.tracks.iter().map(Track::info).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }
}
