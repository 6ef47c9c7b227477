//! Global musical context: tempo, meter, bar counting and count-in.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::{validate_bpm, validate_meter};
use crate::lockfree::{AtomicDouble, AtomicFlag};
use crate::slice::Slice;
use crate::{Error, Result};

/// Transport state shared by `Arc` between the control side and the audio thread.
///
/// Tempo and meter changes are requested from the control side and applied by the audio thread at
/// the next block boundary, so a block never sees two tempos.
#[derive(Debug)]
pub struct MusicalContext {
    bpm: AtomicDouble,
    meter: AtomicU32,
    next_bpm: AtomicDouble,
    next_meter: AtomicU32,
    bar_count: AtomicU32,
    last_bar_position: AtomicDouble,
    position: AtomicDouble,
    count_in_position: AtomicDouble,
    playing: AtomicFlag,
    counting_in: AtomicFlag,
    metronome_on: AtomicFlag,
}

impl MusicalContext {
    pub fn new(bpm: f64, meter: u32) -> Self {
        Self {
            bpm: AtomicDouble::new(bpm),
            meter: AtomicU32::new(meter),
            next_bpm: AtomicDouble::new(0.0),
            next_meter: AtomicU32::new(0),
            bar_count: AtomicU32::new(0),
            last_bar_position: AtomicDouble::new(0.0),
            position: AtomicDouble::new(0.0),
            count_in_position: AtomicDouble::new(0.0),
            playing: AtomicFlag::new(false),
            counting_in: AtomicFlag::new(false),
            metronome_on: AtomicFlag::new(true),
        }
    }

    // --- tempo & meter ---

    #[inline]
    pub fn bpm(&self) -> f64 {
        self.bpm.get()
    }

    #[inline]
    pub fn meter(&self) -> u32 {
        self.meter.load(Ordering::Acquire)
    }

    /// Requests a tempo change, applied at the next block.
    pub fn set_bpm(&self, bpm: f64) -> Result<()> {
        validate_bpm(bpm)?;
        self.next_bpm.set(bpm);
        Ok(())
    }

    /// Requests a meter change, applied at the next block. Refused while counting in.
    pub fn set_meter(&self, meter: u32) -> Result<()> {
        validate_meter(meter)?;
        if self.is_counting_in() {
            return Err(Error::MeterLocked);
        }
        self.next_meter.store(meter, Ordering::Release);
        Ok(())
    }

    /// Applies pending tempo/meter requests (audio thread, block start).
    ///
    /// Returns `true` when the tempo changed.
    #[inline]
    pub fn apply_pending_changes(&self) -> bool {
        let next_meter = self.next_meter.swap(0, Ordering::AcqRel);
        if next_meter > 0 {
            self.meter.store(next_meter, Ordering::Release);
        }
        let next_bpm = self.next_bpm.swap(0.0);
        if next_bpm > 0.0 {
            self.bpm.set(next_bpm);
            true
        } else {
            false
        }
    }

    /// Length in beats of a block of `block_size` samples at the current tempo.
    #[inline]
    pub fn slice_length_beats(&self, block_size: usize, sample_rate: f64) -> f64 {
        block_size as f64 * self.bpm() / (60.0 * sample_rate)
    }

    // --- bars ---

    /// Counts a new bar when the slice crosses a whole beat at least one meter after the last
    /// counted bar. Nothing is counted for slices starting at or before beat 0.
    pub fn update_bars_counter(&self, slice: Slice) {
        if slice.start <= 0.0 {
            return;
        }
        let floored_start = slice.start.floor();
        let floored_end = slice.end.floor();
        if floored_end > floored_start
            && floored_end - self.last_bar_position.get() >= self.meter() as f64
        {
            self.bar_count.fetch_add(1, Ordering::AcqRel);
            self.last_bar_position.set(floored_end);
        }
    }

    /// Global beat of the next bar, or 0 when the transport is at rest.
    pub fn next_quantized_bar_position(&self) -> f64 {
        if self.position() == 0.0 {
            0.0
        } else {
            (self.last_bar_position() + self.meter() as f64).round()
        }
    }

    pub fn reset_counters(&self) {
        self.bar_count.store(0, Ordering::Release);
        self.last_bar_position.set(0.0);
    }

    #[inline]
    pub fn bar_count(&self) -> u32 {
        self.bar_count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn last_bar_position(&self) -> f64 {
        self.last_bar_position.get()
    }

    // --- playhead ---

    #[inline]
    pub fn position(&self) -> f64 {
        self.position.get()
    }

    #[inline]
    pub fn set_position(&self, beats: f64) {
        self.position.set(beats);
    }

    #[inline]
    pub fn count_in_position(&self) -> f64 {
        self.count_in_position.get()
    }

    #[inline]
    pub fn set_count_in_position(&self, beats: f64) {
        self.count_in_position.set(beats);
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing.get()
    }

    #[inline]
    pub fn set_playing(&self, playing: bool) {
        self.playing.set(playing);
    }

    #[inline]
    pub fn is_counting_in(&self) -> bool {
        self.counting_in.get()
    }

    #[inline]
    pub fn set_counting_in(&self, counting_in: bool) {
        self.counting_in.set(counting_in);
    }

    // --- metronome ---

    #[inline]
    pub fn is_metronome_on(&self) -> bool {
        self.metronome_on.get()
    }

    #[inline]
    pub fn set_metronome(&self, on: bool) {
        self.metronome_on.set(on);
    }

    /// Returns the new state.
    #[inline]
    pub fn toggle_metronome(&self) -> bool {
        self.metronome_on.toggle()
    }
}

impl Default for MusicalContext {
    fn default() -> Self {
        Self::new(120.0, 4)
    }
}
