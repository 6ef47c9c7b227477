//! Editable sequence events (control thread only).
//!
//! JSON layout, one object per event:
//!
//! ```json
//! {"type": "note", "uuid": "…", "timestamp": 3.0, "utime": 0.0,
//!  "midiNote": 60, "midiVelocity": 0.8, "duration": 0.5, "chance": 1.0}
//! {"type": "midi", "uuid": "…", "timestamp": 1.0, "utime": 0.0, "eventMidiBytes": "176,64,127"}
//! ```
//!
//! `type` may also be given as a number (`1` = note, `0` = midi). A missing `uuid` gets a fresh id.

use std::fmt;

use cadenza_midi::{format_midi_bytes, parse_midi_bytes, MidiEvent};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::{Error, Result};

/// Stable identity of an editable event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(text: &str) -> Result<Self> {
        Uuid::parse_str(text)
            .map(Self)
            .map_err(|e| Error::InvalidEvent(format!("bad event id '{text}': {e}")))
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<String> for EventId {
    type Error = Error;

    fn try_from(text: String) -> Result<Self> {
        Self::parse(&text)
    }
}

impl From<EventId> for String {
    fn from(id: EventId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Note {
        note: u8,
        /// Normalized velocity in `[0, 1]`.
        velocity: f32,
        duration: f64,
        /// Probability in `[0, 1]` that the note fires on a given pass.
        chance: f32,
    },
    /// Any other channel voice message, kept as its wire bytes.
    Midi { bytes: SmallVec<[u8; 3]> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSequenceEvent", into = "RawSequenceEvent")]
pub struct SequenceEvent {
    pub id: EventId,
    /// Position in beats from the start of the clip.
    pub timestamp: f64,
    /// Nudge in beats added to `timestamp` before quantization.
    pub utime: f64,
    pub kind: EventKind,
}

impl SequenceEvent {
    pub fn note(timestamp: f64, note: u8, velocity: f32, duration: f64) -> Self {
        Self {
            id: EventId::new(),
            timestamp,
            utime: 0.0,
            kind: EventKind::Note {
                note,
                velocity,
                duration,
                chance: 1.0,
            },
        }
    }

    pub fn midi(timestamp: f64, bytes: &[u8]) -> Result<Self> {
        MidiEvent::from_bytes(bytes)?;
        Ok(Self {
            id: EventId::new(),
            timestamp,
            utime: 0.0,
            kind: EventKind::Midi {
                bytes: SmallVec::from_slice(bytes),
            },
        })
    }

    /// Generic event from comma-separated decimal bytes, e.g. `"176,64,127"`.
    pub fn midi_from_str(timestamp: f64, bytes: &str) -> Result<Self> {
        Self::midi(timestamp, &parse_midi_bytes(bytes)?)
    }

    /// Generic event carrying `event`'s message.
    pub fn from_midi_event(timestamp: f64, event: &MidiEvent) -> Self {
        Self {
            id: EventId::new(),
            timestamp,
            utime: 0.0,
            kind: EventKind::Midi {
                bytes: SmallVec::from_vec(event.to_bytes()),
            },
        }
    }

    pub fn with_chance(mut self, chance: f32) -> Self {
        if let EventKind::Note { chance: c, .. } = &mut self.kind {
            *c = chance;
        }
        self
    }

    pub fn with_utime(mut self, utime: f64) -> Self {
        self.utime = utime;
        self
    }

    pub fn with_id(mut self, id: EventId) -> Self {
        self.id = id;
        self
    }

    #[inline]
    pub fn is_note(&self) -> bool {
        matches!(self.kind, EventKind::Note { .. })
    }

    /// Checks ranges: finite times, note < 128, velocity/chance in `[0, 1]`, duration >= 0,
    /// decodable MIDI bytes.
    pub fn validate(&self) -> Result<()> {
        if !self.timestamp.is_finite() || !self.utime.is_finite() {
            return Err(Error::InvalidEvent(format!(
                "timestamp {} / utime {} must be finite",
                self.timestamp, self.utime
            )));
        }
        match &self.kind {
            EventKind::Note {
                note,
                velocity,
                duration,
                chance,
            } => {
                if *note > 127 {
                    return Err(Error::InvalidEvent(format!("note {note} out of range")));
                }
                if !(0.0..=1.0).contains(velocity) {
                    return Err(Error::InvalidEvent(format!(
                        "velocity {velocity} outside [0, 1]"
                    )));
                }
                if !(0.0..=1.0).contains(chance) {
                    return Err(Error::InvalidEvent(format!("chance {chance} outside [0, 1]")));
                }
                if !duration.is_finite() || *duration < 0.0 {
                    return Err(Error::InvalidEvent(format!("duration {duration} is negative")));
                }
            }
            EventKind::Midi { bytes } => {
                MidiEvent::from_bytes(bytes)?;
            }
        }
        Ok(())
    }

    /// Applies a partial update. Fields that do not apply to this kind of event are ignored.
    pub fn apply(&mut self, edit: &EventEdit) -> Result<()> {
        let mut updated = self.clone();
        if let Some(timestamp) = edit.timestamp {
            updated.timestamp = timestamp;
        }
        if let Some(utime) = edit.utime {
            updated.utime = utime;
        }
        match &mut updated.kind {
            EventKind::Note {
                note,
                velocity,
                duration,
                chance,
            } => {
                if let Some(v) = edit.midi_note {
                    *note = v;
                }
                if let Some(v) = edit.midi_velocity {
                    *velocity = v;
                }
                if let Some(v) = edit.duration {
                    *duration = v;
                }
                if let Some(v) = edit.chance {
                    *chance = v;
                }
            }
            EventKind::Midi { bytes } => {
                if let Some(text) = &edit.event_midi_bytes {
                    *bytes = parse_midi_bytes(text)?;
                }
            }
        }
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}

/// Partial update of a [`SequenceEvent`]; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEdit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utime: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub midi_note: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub midi_velocity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chance: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_midi_bytes: Option<String>,
}

// --- wire representation ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawEventType {
    Name(String),
    Code(u8),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSequenceEvent {
    #[serde(rename = "type")]
    kind: RawEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uuid: Option<String>,
    timestamp: f64,
    #[serde(default)]
    utime: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    midi_note: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    midi_velocity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chance: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_midi_bytes: Option<String>,
}

impl TryFrom<RawSequenceEvent> for SequenceEvent {
    type Error = Error;

    fn try_from(raw: RawSequenceEvent) -> Result<Self> {
        let id = match raw.uuid.as_deref() {
            Some(text) if !text.is_empty() => EventId::parse(text)?,
            _ => EventId::new(),
        };
        let is_note = match &raw.kind {
            RawEventType::Name(name) if name == "note" => true,
            RawEventType::Name(name) if name == "midi" => false,
            RawEventType::Code(1) => true,
            RawEventType::Code(0) => false,
            other => {
                return Err(Error::InvalidEvent(format!("unknown event type {other:?}")));
            }
        };
        let kind = if is_note {
            EventKind::Note {
                note: raw
                    .midi_note
                    .ok_or_else(|| Error::InvalidEvent("note event without midiNote".into()))?,
                velocity: raw.midi_velocity.unwrap_or(1.0),
                duration: raw
                    .duration
                    .ok_or_else(|| Error::InvalidEvent("note event without duration".into()))?,
                chance: raw.chance.unwrap_or(1.0),
            }
        } else {
            let text = raw.event_midi_bytes.ok_or_else(|| {
                Error::InvalidEvent("midi event without eventMidiBytes".into())
            })?;
            EventKind::Midi {
                bytes: parse_midi_bytes(&text)?,
            }
        };
        let event = SequenceEvent {
            id,
            timestamp: raw.timestamp,
            utime: raw.utime,
            kind,
        };
        event.validate()?;
        Ok(event)
    }
}

impl From<SequenceEvent> for RawSequenceEvent {
    fn from(event: SequenceEvent) -> Self {
        let mut raw = RawSequenceEvent {
            kind: RawEventType::Name(String::new()),
            uuid: Some(event.id.to_string()),
            timestamp: event.timestamp,
            utime: event.utime,
            midi_note: None,
            midi_velocity: None,
            duration: None,
            chance: None,
            event_midi_bytes: None,
        };
        match event.kind {
            EventKind::Note {
                note,
                velocity,
                duration,
                chance,
            } => {
                raw.kind = RawEventType::Name("note".into());
                raw.midi_note = Some(note);
                raw.midi_velocity = Some(velocity);
                raw.duration = Some(duration);
                raw.chance = Some(chance);
            }
            EventKind::Midi { bytes } => {
                raw.kind = RawEventType::Name("midi".into());
                raw.event_midi_bytes = Some(format_midi_bytes(&bytes));
            }
        }
        raw
    }
}
