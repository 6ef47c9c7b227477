//! Sounding-note tracker used to flush note-offs when playback stops.

use crate::buffer::MidiBuffer;
use crate::event::{MidiEvent, SUSTAIN_PEDAL_CC};

/// Set of sounding notes in the order they started, plus the sustain pedal state.
///
/// Fixed-size, so it can live on the audio thread.
#[derive(Clone, Debug)]
pub struct ActiveNotes {
    bits: u128,
    order: [u8; 128],
    len: usize,
    sustain: bool,
}

impl ActiveNotes {
    pub const fn new() -> Self {
        Self {
            bits: 0,
            order: [0; 128],
            len: 0,
            sustain: false,
        }
    }

    #[inline]
    pub fn contains(&self, note: u8) -> bool {
        note < 128 && self.bits & (1u128 << note) != 0
    }

    #[inline]
    pub fn note_on(&mut self, note: u8) {
        if note >= 128 || self.contains(note) {
            return;
        }
        self.bits |= 1u128 << note;
        self.order[self.len] = note;
        self.len += 1;
    }

    #[inline]
    pub fn note_off(&mut self, note: u8) {
        if !self.contains(note) {
            return;
        }
        self.bits &= !(1u128 << note);
        if let Some(index) = self.order[..self.len].iter().position(|&n| n == note) {
            self.order.copy_within(index + 1..self.len, index);
            self.len -= 1;
        }
    }

    #[inline]
    pub fn is_sustained(&self) -> bool {
        self.sustain
    }

    /// Updates the tracked state from an outgoing event.
    #[inline]
    pub fn track(&mut self, event: &MidiEvent) {
        if event.is_note_on() {
            if let Some(note) = event.note() {
                self.note_on(note);
            }
        } else if event.is_note_off() {
            if let Some(note) = event.note() {
                self.note_off(note);
            }
        } else if let Some(down) = event.sustain_pedal() {
            self.sustain = down;
        }
    }

    /// Sounding notes, oldest first.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.order[..self.len].iter().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Writes a note-off for every sounding note (oldest first) and a sustain release if the
    /// pedal is down, all at `frame_offset`, then forgets everything.
    ///
    /// Returns the number of events written.
    pub fn render_note_offs(&mut self, channel: u8, frame_offset: usize, out: &mut MidiBuffer) -> usize {
        let mut written = 0;
        for &note in &self.order[..self.len] {
            if out.push(MidiEvent::note_off(frame_offset, channel, note, 0)) {
                written += 1;
            }
        }
        if self.sustain
            && out.push(MidiEvent::control_change(
                frame_offset,
                channel,
                SUSTAIN_PEDAL_CC,
                0,
            ))
        {
            written += 1;
        }
        self.clear();
        written
    }

    #[inline]
    pub fn clear(&mut self) {
        self.bits = 0;
        self.len = 0;
        self.sustain = false;
    }
}

impl Default for ActiveNotes {
    fn default() -> Self {
        Self::new()
    }
}
