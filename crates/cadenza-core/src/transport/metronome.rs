//! MIDI metronome rendered sample-accurately into the output block.

use cadenza_midi::{MidiBuffer, MidiEvent};
use serde::{Deserialize, Serialize};

use super::Pulses;

/// Note layout of the metronome click.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetronomeSettings {
    /// Zero-based MIDI channel (15 = channel 16).
    pub channel: u8,
    /// Note for the first beat of each bar.
    pub high_note: u8,
    pub low_note: u8,
    pub velocity: u8,
    /// Samples between a tick's note-on and its note-off.
    pub tick_length: usize,
}

impl Default for MetronomeSettings {
    fn default() -> Self {
        Self {
            channel: 15,
            high_note: 80,
            low_note: 67,
            velocity: 127,
            tick_length: 100,
        }
    }
}

/// Audio-thread metronome. Owns the note-off carried over from the previous block.
#[derive(Debug, Clone)]
pub struct Metronome {
    settings: MetronomeSettings,
    pending_note_off: Option<(usize, u8)>,
}

impl Metronome {
    pub fn new(settings: MetronomeSettings) -> Self {
        Self {
            settings,
            pending_note_off: None,
        }
    }

    pub fn settings(&self) -> &MetronomeSettings {
        &self.settings
    }

    /// Renders ticks for the block starting at `start_beat`.
    ///
    /// A note-off deferred from the previous block is always delivered, even when `enabled` is
    /// false. Ticks on multiples of `meter` use the high note.
    pub fn render(
        &mut self,
        start_beat: f64,
        meter: u32,
        beats_per_sample: f64,
        block_size: usize,
        enabled: bool,
        out: &mut MidiBuffer,
    ) {
        let s = self.settings;
        let last_sample = block_size.saturating_sub(1);

        if let Some((offset, note)) = self.pending_note_off.take() {
            out.push(MidiEvent::note_off(offset.min(last_sample), s.channel, note, 0));
        }
        if !enabled {
            return;
        }

        let meter = meter.max(1) as i64;
        for (sample, beat) in Pulses::new(start_beat, block_size, beats_per_sample, 1.0) {
            let note = if beat.rem_euclid(meter) == 0 {
                s.high_note
            } else {
                s.low_note
            };
            out.push(MidiEvent::note_on(sample, s.channel, note, s.velocity));
            let off_at = sample + s.tick_length;
            if off_at < block_size {
                out.push(MidiEvent::note_off(off_at, s.channel, note, 0));
            } else {
                self.pending_note_off = Some((off_at - block_size, note));
            }
        }
    }

    /// Drops any deferred note-off.
    pub fn reset(&mut self) {
        self.pending_note_off = None;
    }
}

impl Default for Metronome {
    fn default() -> Self {
        Self::new(MetronomeSettings::default())
    }
}
