//! MIDI types for the cadenza sequencer.
//!
//! Everything in this crate that the audio thread touches is fixed-size: events are `Copy`,
//! buffers are allocated once up front and the note tracker is a pair of flat arrays.
//!
//! - [`MidiEvent`] / [`ClockEvent`]: sample-accurate channel voice and realtime messages
//! - [`MidiBuffer`] / [`ClockBuffer`]: pre-sized per-block event storage, kept in frame order
//! - [`ActiveNotes`]: sounding notes and sustain pedal, for note-off flushes

pub mod error;
pub use error::{Error, Result};

pub mod buffer;
pub use buffer::{ClockBuffer, MidiBuffer, Timed, TimedBuffer, DEFAULT_BUFFER_CAPACITY};

pub(crate) mod event;
pub use event::{ClockEvent, ClockMessage, MidiEvent, PITCH_BEND_CENTER, SUSTAIN_PEDAL_CC};

pub mod notes;
pub use notes::ActiveNotes;

pub(crate) mod utils;
pub use utils::{format_midi_bytes, gain_to_velocity, parse_midi_bytes, velocity_to_gain};

// Re-export essential upstream types (users shouldn't need to import midi-msg directly)
pub use midi_msg::{Channel, ChannelVoiceMsg, ControlChange, MidiMsg, SystemRealTimeMsg};
