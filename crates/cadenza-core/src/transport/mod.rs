pub(crate) mod clock;
pub(crate) mod context;
pub(crate) mod metronome;

// Re-export essential types
pub use clock::{MidiClock, CLOCK_PULSES_PER_BEAT};
pub use context::MusicalContext;
pub use metronome::{Metronome, MetronomeSettings};

/// Sample offsets within a block at which a grid of `pulses_per_beat` points per beat is crossed.
///
/// Sample `i` covers `[start + i * bps, start + (i + 1) * bps)`; a grid point inside that range
/// yields `i`. Each grid point is reported by exactly one block as long as consecutive blocks
/// share their boundary position.
pub(crate) struct Pulses {
    next: f64,
    pulses_per_beat: f64,
    start: f64,
    end: f64,
    samples_per_beat: f64,
    last_sample: usize,
}

impl Pulses {
    pub(crate) fn new(start: f64, block_size: usize, beats_per_sample: f64, pulses_per_beat: f64) -> Self {
        let end = start + block_size as f64 * beats_per_sample;
        Self {
            next: (start * pulses_per_beat).ceil(),
            pulses_per_beat,
            start,
            end,
            samples_per_beat: 1.0 / beats_per_sample,
            last_sample: block_size.saturating_sub(1),
        }
    }
}

impl Iterator for Pulses {
    /// `(sample offset, grid index)`; the grid index is the pulse number counted from beat 0.
    type Item = (usize, i64);

    fn next(&mut self) -> Option<Self::Item> {
        let pulse = self.next;
        let beat = pulse / self.pulses_per_beat;
        if !(beat < self.end) {
            return None;
        }
        self.next += 1.0;
        let offset = ((beat - self.start) * self.samples_per_beat + 1e-9).floor();
        let sample = if offset <= 0.0 {
            0
        } else {
            (offset as usize).min(self.last_sample)
        };
        Some((sample, pulse as i64))
    }
}
