//! Slice clock: the half-open beat range an audio block covers.

use cadenza_midi::Channel;

/// Half-open beat interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Slice {
    pub start: f64,
    pub end: f64,
}

impl Slice {
    #[inline]
    pub fn new(start: f64, end: f64) -> Self {
        debug_assert!(end >= start, "slice end {end} precedes start {start}");
        Self { start, end }
    }

    /// Slice starting at `start` covering `length` beats.
    #[inline]
    pub fn from_start(start: f64, length: f64) -> Self {
        Self::new(start, start + length)
    }

    /// Empty slice at `position`.
    #[inline]
    pub fn at(position: f64) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    #[inline]
    pub fn len(&self) -> f64 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// `start <= beat < end`. An empty slice contains nothing.
    #[inline]
    pub fn contains(&self, beat: f64) -> bool {
        self.start <= beat && beat < self.end
    }
}

/// Per-block parameters handed to every clip engine.
#[derive(Debug, Clone, Copy)]
pub struct BlockContext {
    /// Global beat range covered by this block.
    pub parent: Slice,
    pub bpm: f64,
    pub sample_rate: f64,
    pub block_size: usize,
    /// Output channel of the owning track. `None` suppresses emission.
    pub out_channel: Option<Channel>,
    pub record_automation: bool,
}

impl BlockContext {
    #[inline]
    pub fn samples_per_beat(&self) -> f64 {
        60.0 * self.sample_rate / self.bpm
    }

    #[inline]
    pub fn beats_per_sample(&self) -> f64 {
        self.bpm / (60.0 * self.sample_rate)
    }

    /// Sample index for a beat offset from the start of the block, clamped to the block.
    #[inline]
    pub fn sample_offset(&self, beats_into_slice: f64) -> usize {
        let samples = (beats_into_slice * self.samples_per_beat()).floor();
        let last = self.block_size.saturating_sub(1);
        if samples <= 0.0 {
            0
        } else if samples >= last as f64 {
            last
        } else {
            samples as usize
        }
    }

    /// Beat position within `slice` of a sample in this block.
    #[inline]
    pub fn beat_at_sample(&self, slice: Slice, sample: usize) -> f64 {
        slice.start + slice.len() * sample as f64 / self.block_size as f64
    }
}
