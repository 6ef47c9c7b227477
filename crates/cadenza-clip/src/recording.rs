//! Recording capture (audio thread) and merge into the editable sequence (control thread).

use cadenza_midi::{velocity_to_gain, MidiEvent};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};

use crate::event::SequenceEvent;

/// Default capacity of a clip's record ring.
pub const DEFAULT_RECORD_CAPACITY: usize = 1024;

/// Number of recent note-ons remembered for pre-recording.
pub const RECENT_NOTE_ONS: usize = 20;

/// Note-ons this many beats before the record start are pulled onto it.
pub const PRE_RECORDING_THRESHOLD: f64 = 0.25;

/// An incoming message stamped with its clip-local beat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordedEvent {
    pub beat: f64,
    pub event: MidiEvent,
    /// Recording pass the message belongs to. Zero outside recording.
    pub session: u32,
}

pub(crate) fn record_channel(capacity: usize) -> (HeapProd<RecordedEvent>, HeapCons<RecordedEvent>) {
    HeapRb::new(capacity.max(1)).split()
}

/// The last [`RECENT_NOTE_ONS`] note-ons a track received, stamped in global beats.
///
/// Fixed storage; written and read on the audio thread.
#[derive(Debug, Clone)]
pub struct RecentNoteOns {
    slots: [Option<RecordedEvent>; RECENT_NOTE_ONS],
    next: usize,
}

impl RecentNoteOns {
    pub const fn new() -> Self {
        Self {
            slots: [None; RECENT_NOTE_ONS],
            next: 0,
        }
    }

    /// Remembers `event` if it is a note-on, evicting the oldest entry when full.
    #[inline]
    pub fn push(&mut self, beat: f64, event: MidiEvent) {
        if !event.is_note_on() {
            return;
        }
        self.slots[self.next] = Some(RecordedEvent {
            beat,
            event,
            session: 0,
        });
        self.next = (self.next + 1) % RECENT_NOTE_ONS;
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &RecordedEvent> + '_ {
        self.slots.iter().flatten()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn clear(&mut self) {
        self.slots = [None; RECENT_NOTE_ONS];
        self.next = 0;
    }
}

impl Default for RecentNoteOns {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns recorded messages into sequence events.
///
/// Note-ons are held until their note-off arrives, possibly in a later merge. Note-ons left
/// open when a recording pass ends are discarded once the next pass delivers its first message.
#[derive(Debug, Default)]
pub struct RecordingMerger {
    pending_note_ons: Vec<RecordedEvent>,
    session: u32,
}

impl RecordingMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note-ons still waiting for their note-off.
    pub fn pending(&self) -> usize {
        self.pending_note_ons.len()
    }

    pub fn clear(&mut self) {
        self.pending_note_ons.clear();
    }

    /// Folds one recorded message into `events`. Returns `true` when an event was added.
    ///
    /// Beats at or past `length` (when non-zero) wrap back into the loop, and a note-off
    /// before its note-on means the playhead looped in between.
    pub fn merge(&mut self, recorded: RecordedEvent, length: f64, events: &mut Vec<SequenceEvent>) -> bool {
        let beat = if length > 0.0 && recorded.beat >= length {
            recorded.beat - length
        } else {
            recorded.beat
        };
        let event = recorded.event;
        if recorded.session != self.session {
            self.pending_note_ons.clear();
            self.session = recorded.session;
        }

        if event.is_note_on() {
            // A retriggered key was released without us seeing the note-off.
            let note = event.note();
            self.pending_note_ons.retain(|pending| pending.event.note() != note);
            self.pending_note_ons.push(RecordedEvent { beat, ..recorded });
            return false;
        }

        if event.is_note_off() {
            let Some(note) = event.note() else {
                return false;
            };
            let Some(index) = self
                .pending_note_ons
                .iter()
                .position(|pending| pending.event.note() == Some(note))
            else {
                return false;
            };
            let note_on = self.pending_note_ons.remove(index);
            let mut duration = beat - note_on.beat;
            if duration < 0.0 {
                duration += length;
            }
            let velocity = velocity_to_gain(note_on.event.velocity().unwrap_or(127));
            events.push(SequenceEvent::note(note_on.beat, note, velocity, duration));
            return true;
        }

        if event.is_controller() || event.is_pressure() || event.pitch_bend_value().is_some() {
            events.push(SequenceEvent::from_midi_event(beat, &event));
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use approx::assert_relative_eq;

    fn rec(beat: f64, event: MidiEvent) -> RecordedEvent {
        RecordedEvent {
            beat,
            event,
            session: 1,
        }
    }

    fn note_durations(events: &[SequenceEvent]) -> Vec<(f64, f64)> {
        events
            .iter()
            .filter_map(|event| match event.kind {
                EventKind::Note { duration, .. } => Some((event.timestamp, duration)),
                EventKind::Midi { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_note_pairs_across_merges() {
        let mut merger = RecordingMerger::new();
        let mut events = Vec::new();

        assert!(!merger.merge(rec(3.1, MidiEvent::note_on(0, 0, 60, 127)), 16.0, &mut events));
        assert_eq!(merger.pending(), 1);
        assert!(events.is_empty());

        assert!(merger.merge(rec(3.6, MidiEvent::note_off(0, 0, 60, 0)), 16.0, &mut events));
        assert_eq!(merger.pending(), 0);
        assert_eq!(events.len(), 1);
        assert_relative_eq!(events[0].timestamp, 3.1);
        match events[0].kind {
            EventKind::Note {
                note,
                velocity,
                duration,
                ..
            } => {
                assert_eq!(note, 60);
                assert_relative_eq!(velocity, 1.0);
                assert_relative_eq!(duration, 0.5, epsilon = 1e-9);
            }
            _ => panic!("expected a note"),
        }
    }

    #[test]
    fn test_note_across_loop_gets_wrapped_duration() {
        let mut merger = RecordingMerger::new();
        let mut events = Vec::new();
        merger.merge(rec(7.5, MidiEvent::note_on(0, 0, 60, 100)), 8.0, &mut events);
        merger.merge(rec(0.5, MidiEvent::note_off(0, 0, 60, 0)), 8.0, &mut events);
        match events[0].kind {
            EventKind::Note { duration, .. } => assert_relative_eq!(duration, 1.0),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_note_held_past_record_stop_is_dropped_next_pass() {
        let mut merger = RecordingMerger::new();
        let mut events = Vec::new();
        merger.merge(rec(1.0, MidiEvent::note_on(0, 0, 60, 100)), 8.0, &mut events);
        assert_eq!(merger.pending(), 1);

        let second = |beat, event| RecordedEvent {
            session: 2,
            ..rec(beat, event)
        };
        merger.merge(second(5.0, MidiEvent::note_on(0, 0, 60, 100)), 8.0, &mut events);
        assert_eq!(merger.pending(), 1);
        assert!(merger.merge(second(6.0, MidiEvent::note_off(0, 0, 60, 0)), 8.0, &mut events));

        assert_eq!(merger.pending(), 0);
        assert_eq!(note_durations(&events), vec![(5.0, 1.0)]);
    }

    #[test]
    fn test_retriggered_note_replaces_unreleased_one() {
        let mut merger = RecordingMerger::new();
        let mut events = Vec::new();
        // Pulled onto the record start, but its key went up before recording began
        merger.merge(rec(0.0, MidiEvent::note_on(0, 0, 62, 90)), 8.0, &mut events);
        merger.merge(rec(2.0, MidiEvent::note_on(0, 0, 62, 90)), 8.0, &mut events);
        merger.merge(rec(2.5, MidiEvent::note_off(0, 0, 62, 0)), 8.0, &mut events);

        assert_eq!(merger.pending(), 0);
        assert_eq!(note_durations(&events), vec![(2.0, 0.5)]);
    }

    #[test]
    fn test_beats_past_length_wrap() {
        let mut merger = RecordingMerger::new();
        let mut events = Vec::new();
        merger.merge(rec(9.0, MidiEvent::control_change(0, 0, 1, 64)), 8.0, &mut events);
        assert_relative_eq!(events[0].timestamp, 1.0);
    }

    #[test]
    fn test_stray_note_off_and_program_change_ignored() {
        let mut merger = RecordingMerger::new();
        let mut events = Vec::new();
        assert!(!merger.merge(rec(1.0, MidiEvent::note_off(0, 0, 60, 0)), 0.0, &mut events));
        let program = MidiEvent::from_bytes(&[0xC0, 5]).unwrap();
        assert!(!merger.merge(rec(1.0, program), 0.0, &mut events));
        assert!(events.is_empty());
    }

    #[test]
    fn test_recent_note_ons_keeps_last_twenty() {
        let mut recent = RecentNoteOns::new();
        recent.push(0.0, MidiEvent::control_change(0, 0, 1, 1));
        assert!(recent.is_empty());

        for i in 0..25u8 {
            recent.push(i as f64, MidiEvent::note_on(0, 0, 40 + i, 100));
        }
        assert_eq!(recent.len(), RECENT_NOTE_ONS);
        let oldest = recent.iter().map(|r| r.beat).fold(f64::MAX, f64::min);
        assert_eq!(oldest, 5.0);

        recent.clear();
        assert!(recent.is_empty());
    }

    #[test]
    fn test_record_channel_capacity() {
        let (mut producer, mut consumer) = record_channel(2);
        let event = rec(0.0, MidiEvent::note_on(0, 0, 60, 100));
        assert!(producer.try_push(event).is_ok());
        assert!(producer.try_push(event).is_ok());
        assert!(producer.try_push(event).is_err());
        assert_eq!(consumer.try_pop(), Some(event));
    }
}
