//! JSON payloads for replacing or editing a clip's sequence.
//!
//! ```json
//! {"clipLength": 6, "sequenceEvents": [{"type": "note", "midiNote": 79, "midiVelocity": 1.0,
//!   "timestamp": 0.29, "duration": 0.65}]}
//!
//! {"action": "removeEvent", "eventUUID": "…"}
//! {"action": "editEvent", "eventUUID": "…", "eventData": {"midiNote": 80}}
//! {"action": "addEvent", "eventData": {"type": "note", "midiNote": 60, …}}
//! ```

use serde::{Deserialize, Serialize};

use crate::clip::Clip;
use crate::event::{EventEdit, EventId, SequenceEvent};
use crate::Result;

/// Full replacement of a clip's events and length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSequence {
    pub clip_length: f64,
    #[serde(default)]
    pub sequence_events: Vec<SequenceEvent>,
}

impl SetSequence {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn apply(self, clip: &mut Clip) -> Result<()> {
        clip.set_sequence(self.clip_length, self.sequence_events)
    }
}

/// A single-event edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SequenceEdit {
    AddEvent {
        #[serde(rename = "eventData")]
        event: SequenceEvent,
    },
    RemoveEvent {
        #[serde(rename = "eventUUID")]
        id: EventId,
    },
    EditEvent {
        #[serde(rename = "eventUUID")]
        id: EventId,
        #[serde(rename = "eventData")]
        edit: EventEdit,
    },
}

impl SequenceEdit {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Applies the edit, returning the id of the affected event.
    pub fn apply(self, clip: &mut Clip) -> Result<EventId> {
        match self {
            Self::AddEvent { event } => clip.add_event(event),
            Self::RemoveEvent { id } => clip.remove_event(id).map(|event| event.id),
            Self::EditEvent { id, edit } => clip.edit_event(id, &edit).map(|()| id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::ClipOptions;
    use crate::event::EventKind;
    use crate::Error;
    use cadenza_core::ReleasePool;

    #[test]
    fn test_set_sequence_payload() {
        let payload = SetSequence::from_json(
            r#"{"clipLength": 6, "sequenceEvents": [
                {"type": 1, "midiNote": 79, "midiVelocity": 1.0, "timestamp": 0.29, "duration": 0.65},
                {"type": "midi", "eventMidiBytes": "176,1,56", "timestamp": 2.99}
            ]}"#,
        )
        .unwrap();
        assert_eq!(payload.clip_length, 6.0);
        assert_eq!(payload.sequence_events.len(), 2);

        let pool = ReleasePool::new();
        let (mut clip, _engine) = Clip::new(&pool, ClipOptions::default());
        payload.apply(&mut clip).unwrap();
        assert_eq!(clip.length(), 6.0);
        assert_eq!(clip.events().len(), 2);
    }

    #[test]
    fn test_edit_sequence_payloads() {
        let pool = ReleasePool::new();
        let (mut clip, _engine) = Clip::new(&pool, ClipOptions::default());
        clip.set_length(4.0).unwrap();

        let id = SequenceEdit::from_json(
            r#"{"action": "addEvent", "eventData": {"type": "note", "midiNote": 60,
                "midiVelocity": 0.5, "timestamp": 1.0, "duration": 1.0, "chance": 0.5}}"#,
        )
        .unwrap()
        .apply(&mut clip)
        .unwrap();
        assert_eq!(clip.events().len(), 1);

        let edit = format!(
            r#"{{"action": "editEvent", "eventUUID": "{id}", "eventData": {{"midiNote": 62}}}}"#
        );
        SequenceEdit::from_json(&edit).unwrap().apply(&mut clip).unwrap();
        assert!(matches!(clip.events()[0].kind, EventKind::Note { note: 62, .. }));

        let remove = format!(r#"{{"action": "removeEvent", "eventUUID": "{id}"}}"#);
        SequenceEdit::from_json(&remove).unwrap().apply(&mut clip).unwrap();
        assert!(clip.events().is_empty());
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(matches!(
            SequenceEdit::from_json(r#"{"action": "explode"}"#),
            Err(Error::Json(_))
        ));
        assert!(SequenceEdit::from_json(r#"{"action": "removeEvent", "eventUUID": "nope"}"#).is_err());
        assert!(SetSequence::from_json(r#"{"sequenceEvents": []}"#).is_err());
    }
}
