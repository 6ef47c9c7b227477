//! # Cadenza - realtime MIDI clip sequencer
//!
//! A grid of loopable MIDI clips (tracks × scenes) driven by a sample-accurate transport.
//!
//! ## Architecture
//!
//! Cadenza is an umbrella crate that coordinates:
//! - **cadenza-midi** - RT-safe MIDI events, pre-sized buffers, note tracking
//! - **cadenza-core** - Slice clock, playheads, musical context, metronome/clock rendering,
//!   lock-free sequence publication and deferred reclamation
//! - **cadenza-clip** - Editable sequences, quantized builder, recording, clip engine
//!
//! Every component comes as a control/realtime pair built together: [`Sequencer`] /
//! [`SequencerEngine`], [`Track`] / [`TrackEngine`], [`Clip`] / [`ClipEngine`]. The control halves
//! edit and publish; the realtime halves only read atomics, pop the newest published sequence
//! and write into pre-sized buffers.
//!
//! ## Quick Start
//!
//! ```ignore
//! use cadenza::prelude::*;
//!
//! let (mut sequencer, mut engine) = Sequencer::builder()
//!     .sample_rate(48000.0)
//!     .block_size(256)
//!     .build()?;
//!
//! sequencer.handle("/clip/setSequence", &["0", "0", r#"{"clipLength": 4, "sequenceEvents": [
//!     {"type": "note", "midiNote": 60, "midiVelocity": 0.8, "timestamp": 0, "duration": 1}]}"#])?;
//! sequencer.handle("/clip/play", &["0", "0"])?;
//! sequencer.handle::<&str>("/transport/playStop", &[])?;
//!
//! // control thread, every few milliseconds
//! sequencer.poll();
//!
//! // audio thread
//! let mut output = engine.new_output();
//! engine.process_block(&incoming, &mut output);
//! ```

/// Re-export of cadenza-core for direct access
pub use cadenza_core as core;

/// Re-export of cadenza-midi for direct access
pub use cadenza_midi as midi;

/// Re-export of cadenza-clip for direct access
pub use cadenza_clip as clip;

pub use cadenza_clip::{
    Clip, ClipContents, ClipEngine, ClipOptions, ClipState, ClipStatus, EventEdit, EventId,
    EventKind, PlayStatus, PollReport, RecordStatus, Sequence, SequenceBuilder, SequenceEdit,
    SequenceEvent, SetSequence,
};
pub use cadenza_core::{
    BlockContext, EngineConfig, MetronomeSettings, MusicalContext, Playhead, ReleasePool, Slice,
};
pub use cadenza_midi::{Channel, ClockBuffer, ClockEvent, MidiBuffer, MidiEvent};

mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::{SequencerConfig, MAX_SCENES, MAX_TRACKS};

mod builder;
pub use builder::SequencerBuilder;

mod track;
pub use track::{StopOptions, Track, TrackEngine, TrackState};

mod sequencer;
pub use sequencer::{BlockOutput, ClipAddress, Sequencer, SequencerEngine, StatusHook};

mod command;
pub use command::Command;

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{
        BlockOutput, Channel, Clip, ClipAddress, ClipStatus, Command, MidiBuffer, MidiEvent,
        Sequencer, SequencerBuilder, SequencerConfig, SequencerEngine, SequenceEvent,
    };
}
