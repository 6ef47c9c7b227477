//! Turns an editable event list into a render-ready [`Sequence`].
//!
//! Runs on the control thread whenever the events, length, quantization or wrap policy change.
//!
//! Steps, in order:
//! 1. Events at or after the clip length are ignored. Start positions (`timestamp + utime`) are
//!    wrapped into `[0, length)` when negative and snapped to the quantization grid.
//! 2. Each note becomes a note-on/note-off pair. Note-offs past the loop end wrap around when
//!    wrapping is enabled; otherwise the note is dropped.
//! 3. Note-ons are matched with the nearest following note-off of the same number (cyclically
//!    when wrapping). Unmatched notes are dropped, and a note-on that arrives while the same
//!    number is still sounding is removed together with its note-off.
//! 4. A centring pitch bend is added at beat 0 if the last pitch bend leaves the wheel off centre.

use cadenza_midi::{gain_to_velocity, MidiEvent, PITCH_BEND_CENTER};

use crate::event::{EventKind, SequenceEvent};
use crate::sequence::{Annotation, Sequence, TimedMessage};

/// Snaps `beat` to the nearest multiple of `step`. A step of zero leaves it unchanged.
#[inline]
pub fn quantize(beat: f64, step: f64) -> f64 {
    if step > 0.0 {
        (beat / step).round() * step
    } else {
        beat
    }
}

/// Build settings of one clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceBuilder {
    length: f64,
    quantization: f64,
    wrap_events_across_loop: bool,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    beat: f64,
    event: MidiEvent,
    annotation: Option<Annotation>,
}

impl Entry {
    #[inline]
    fn note_on(&self) -> Option<u8> {
        if self.event.is_note_on() {
            self.event.note()
        } else {
            None
        }
    }

    #[inline]
    fn note_off(&self) -> Option<u8> {
        if self.event.is_note_off() {
            self.event.note()
        } else {
            None
        }
    }

    /// Note-offs sort before anything else at the same beat.
    #[inline]
    fn rank(&self) -> u8 {
        u8::from(!self.event.is_note_off())
    }
}

impl SequenceBuilder {
    pub fn new(length: f64) -> Self {
        Self {
            length,
            quantization: 0.0,
            wrap_events_across_loop: true,
        }
    }

    pub fn quantization(mut self, step: f64) -> Self {
        self.quantization = step;
        self
    }

    pub fn wrap_events_across_loop(mut self, wrap: bool) -> Self {
        self.wrap_events_across_loop = wrap;
        self
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn build(&self, events: &[SequenceEvent]) -> Sequence {
        let length = self.length;
        if length <= 0.0 || !length.is_finite() {
            return Sequence::empty(0.0);
        }

        let mut entries = Vec::with_capacity(events.len() * 2);
        for event in events {
            if event.timestamp >= length {
                continue;
            }
            let Some(start) = self.place_start(event.timestamp + event.utime) else {
                continue;
            };
            match &event.kind {
                EventKind::Note {
                    note,
                    velocity,
                    duration,
                    chance,
                } => {
                    let Some(end) = self.place_end(start, *duration) else {
                        continue;
                    };
                    let velocity = gain_to_velocity(*velocity).max(1);
                    entries.push(Entry {
                        beat: start,
                        event: MidiEvent::note_on(0, 0, *note, velocity),
                        annotation: Some(Annotation {
                            id: event.id,
                            chance: *chance,
                        }),
                    });
                    entries.push(Entry {
                        beat: end,
                        event: MidiEvent::note_off(0, 0, *note, 0),
                        annotation: None,
                    });
                }
                EventKind::Midi { bytes } => {
                    let Ok(message) = MidiEvent::from_bytes(bytes) else {
                        continue;
                    };
                    entries.push(Entry {
                        beat: start,
                        event: message,
                        annotation: None,
                    });
                }
            }
        }

        sort_entries(&mut entries);
        let mut entries = self.match_notes(entries);
        reset_pitch_bend(&mut entries);

        let (messages, annotations) = entries
            .into_iter()
            .map(|entry| {
                (
                    TimedMessage {
                        beat: entry.beat,
                        event: entry.event,
                    },
                    entry.annotation,
                )
            })
            .unzip();
        Sequence::from_parts(length, messages, annotations)
    }

    fn place_start(&self, beat: f64) -> Option<f64> {
        let length = self.length;
        let beat = if beat < 0.0 { beat.rem_euclid(length) } else { beat };
        let snapped = quantize(beat, self.quantization);
        if snapped < length {
            return Some(snapped);
        }
        if !self.wrap_events_across_loop {
            return None;
        }
        let wrapped = snapped.rem_euclid(length);
        Some(if wrapped < length { wrapped } else { 0.0 })
    }

    fn place_end(&self, start: f64, duration: f64) -> Option<f64> {
        let length = self.length;
        let duration = duration.clamp(0.0, length);
        if duration <= 0.0 {
            return None;
        }
        let end = start + duration;
        if end < length {
            Some(end)
        } else if end == length || self.wrap_events_across_loop {
            // A note ending on the loop point releases at beat 0 of the next pass.
            Some(end - length)
        } else {
            None
        }
    }

    /// Pairs note-ons with note-offs and removes unmatched and overlapping notes.
    fn match_notes(&self, entries: Vec<Entry>) -> Vec<Entry> {
        let n = entries.len();
        let mut partner: Vec<Option<usize>> = vec![None; n];
        let mut off_taken = vec![false; n];

        for i in 0..n {
            let Some(note) = entries[i].note_on() else {
                continue;
            };
            let wrap = self.wrap_events_across_loop;
            let found = (i + 1..n)
                .chain(0..i)
                .filter(|&j| j > i || wrap || entries[j].beat == 0.0)
                .find(|&j| !off_taken[j] && entries[j].note_off() == Some(note));
            if let Some(j) = found {
                off_taken[j] = true;
                partner[i] = Some(j);
            }
        }

        let mut keep: Vec<bool> = (0..n)
            .map(|i| {
                if entries[i].note_on().is_some() {
                    partner[i].is_some()
                } else if entries[i].note_off().is_some() {
                    off_taken[i]
                } else {
                    true
                }
            })
            .collect();

        // Notes wrapping across the loop point are already sounding at beat 0.
        let mut sounding = 0u128;
        for i in 0..n {
            if let (Some(note), Some(j)) = (entries[i].note_on(), partner[i]) {
                if j < i {
                    sounding |= 1u128 << note;
                }
            }
        }

        for i in 0..n {
            if !keep[i] {
                continue;
            }
            if let Some(note) = entries[i].note_on() {
                let bit = 1u128 << note;
                if sounding & bit != 0 {
                    keep[i] = false;
                    if let Some(j) = partner[i] {
                        keep[j] = false;
                    }
                } else {
                    sounding |= bit;
                }
            } else if let Some(note) = entries[i].note_off() {
                sounding &= !(1u128 << note);
            }
        }

        entries
            .into_iter()
            .zip(keep)
            .filter_map(|(entry, keep)| keep.then_some(entry))
            .collect()
    }
}

fn sort_entries(entries: &mut [Entry]) {
    entries.sort_by(|a, b| a.beat.total_cmp(&b.beat).then(a.rank().cmp(&b.rank())));
}

fn reset_pitch_bend(entries: &mut Vec<Entry>) {
    let last_bend = entries
        .iter()
        .rev()
        .find_map(|entry| entry.event.pitch_bend_value());
    if matches!(last_bend, Some(value) if value != PITCH_BEND_CENTER) {
        entries.push(Entry {
            beat: 0.0,
            event: MidiEvent::pitch_bend(0, 0, PITCH_BEND_CENTER),
            annotation: None,
        });
        sort_entries(entries);
    }
}
