//! Per-clip playhead: play/stop cueing and the clip-local slice.
//!
//! All state is atomic so the control thread can arm cues and query status while the audio
//! thread advances the slice. Play and stop cues are positions in the parent (global) beat space;
//! the slice is in the clip's local space.

use crate::lockfree::{AtomicCue, AtomicDouble, AtomicFlag, EdgeLatch};
use crate::slice::Slice;

#[derive(Debug, Default)]
pub struct Playhead {
    playing: AtomicFlag,
    play_at: AtomicCue,
    stop_at: AtomicCue,
    slice_start: AtomicDouble,
    slice_end: AtomicDouble,
    just_stopped: EdgeLatch,
}

impl Playhead {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn play_now(&self) {
        self.play_now_with_offset(0.0);
    }

    /// Starts playing so that local beat 0 lands `offset` beats into the next captured slice.
    #[inline]
    pub fn play_now_with_offset(&self, offset: f64) {
        self.reset_slice_with_offset(offset);
        self.play_at.clear();
        self.playing.set(true);
        self.just_stopped.reset();
    }

    #[inline]
    pub fn play_at(&self, position: f64) {
        self.play_at.arm(position);
    }

    #[inline]
    pub fn stop_now(&self) {
        self.stop_at.clear();
        self.playing.set(false);
        self.just_stopped.set();
    }

    #[inline]
    pub fn stop_at(&self, position: f64) {
        self.stop_at.arm(position);
    }

    #[inline]
    pub fn clear_play_cue(&self) {
        self.play_at.clear();
    }

    #[inline]
    pub fn clear_stop_cue(&self) {
        self.stop_at.clear();
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing.get()
    }

    #[inline]
    pub fn is_cued_to_play(&self) -> bool {
        self.play_at.is_armed()
    }

    #[inline]
    pub fn is_cued_to_stop(&self) -> bool {
        self.stop_at.is_armed()
    }

    /// True once after each stop; starting again clears it.
    #[inline]
    pub fn has_just_stopped(&self) -> bool {
        self.just_stopped.take()
    }

    #[inline]
    pub fn play_at_cue_beats(&self) -> f64 {
        self.play_at.position()
    }

    #[inline]
    pub fn stop_at_cue_beats(&self) -> f64 {
        self.stop_at.position()
    }

    #[inline]
    pub fn play_cue(&self) -> Option<f64> {
        self.play_at.get()
    }

    #[inline]
    pub fn stop_cue(&self) -> Option<f64> {
        self.stop_at.get()
    }

    /// Extends the slice by `parent_len` beats. No-op while stopped.
    #[inline]
    pub fn capture_slice(&self, parent_len: f64) {
        if !self.is_playing() {
            return;
        }
        self.slice_end.set(self.slice_start.get() + parent_len);
    }

    /// Collapses the slice to `[end, end)`.
    #[inline]
    pub fn release_slice(&self) {
        self.slice_start.set(self.slice_end.get());
    }

    #[inline]
    pub fn reset_slice(&self) {
        self.reset_slice_with_offset(0.0);
    }

    #[inline]
    pub fn reset_slice_with_offset(&self, offset: f64) {
        self.slice_start.set(-offset);
        self.slice_end.set(-offset);
    }

    #[inline]
    pub fn current_slice(&self) -> Slice {
        Slice {
            start: self.slice_start.get(),
            end: self.slice_end.get(),
        }
    }

    /// Start of the current slice.
    #[inline]
    pub fn position(&self) -> f64 {
        self.slice_start.get()
    }
}
