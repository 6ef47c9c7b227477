//! Immutable, render-ready sequence snapshots.

use cadenza_midi::MidiEvent;

use crate::event::EventId;

/// Per-note data the realtime path needs beyond the MIDI message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Annotation {
    pub id: EventId,
    pub chance: f32,
}

/// A MIDI message at a beat position inside the clip.
///
/// The channel stored in `event` is irrelevant; the engine rewrites it to the track's output
/// channel when emitting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedMessage {
    pub beat: f64,
    pub event: MidiEvent,
}

/// Built by [`SequenceBuilder`](crate::SequenceBuilder), read by the clip engine.
///
/// `events` is sorted by beat; `annotations` is aligned with it one to one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequence {
    length: f64,
    events: Vec<TimedMessage>,
    annotations: Vec<Option<Annotation>>,
}

impl Sequence {
    pub(crate) fn from_parts(
        length: f64,
        events: Vec<TimedMessage>,
        annotations: Vec<Option<Annotation>>,
    ) -> Self {
        debug_assert_eq!(events.len(), annotations.len());
        debug_assert!(events.windows(2).all(|w| w[0].beat <= w[1].beat));
        Self {
            length,
            events,
            annotations,
        }
    }

    /// Empty sequence with the given loop length.
    pub fn empty(length: f64) -> Self {
        Self {
            length,
            ..Default::default()
        }
    }

    /// Loop length in beats. Zero means the clip does not loop.
    #[inline]
    pub fn length(&self) -> f64 {
        self.length
    }

    #[inline]
    pub fn events(&self) -> &[TimedMessage] {
        &self.events
    }

    #[inline]
    pub fn annotations(&self) -> &[Option<Annotation>] {
        &self.annotations
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events paired with their annotations.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&TimedMessage, Option<&Annotation>)> + '_ {
        self.events
            .iter()
            .zip(self.annotations.iter().map(Option::as_ref))
    }

    /// Annotation of the note with the given id, if it survived the build.
    pub fn annotation_of(&self, id: EventId) -> Option<&Annotation> {
        self.annotations
            .iter()
            .flatten()
            .find(|annotation| annotation.id == id)
    }
}
