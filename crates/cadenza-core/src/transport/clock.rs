//! MIDI clock output (24 pulses per quarter note).

use cadenza_midi::{ClockBuffer, ClockEvent};

use super::Pulses;

pub const CLOCK_PULSES_PER_BEAT: f64 = 24.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct MidiClock;

impl MidiClock {
    pub fn new() -> Self {
        Self
    }

    /// Renders timing-clock pulses for a playing block starting at `start_beat`.
    pub fn render(
        &self,
        start_beat: f64,
        beats_per_sample: f64,
        block_size: usize,
        out: &mut ClockBuffer,
    ) {
        for (sample, _) in Pulses::new(
            start_beat,
            block_size,
            beats_per_sample,
            CLOCK_PULSES_PER_BEAT,
        ) {
            out.push(ClockEvent::tick(sample));
        }
    }

    #[inline]
    pub fn render_start(&self, out: &mut ClockBuffer) {
        out.push(ClockEvent::start(0));
    }

    #[inline]
    pub fn render_stop(&self, out: &mut ClockBuffer) {
        out.push(ClockEvent::stop(0));
    }
}
