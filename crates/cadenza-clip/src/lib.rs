//! Loopable MIDI clips.
//!
//! # Primary API
//!
//! - [`Clip`] / [`ClipEngine`]: control handle and realtime engine of one clip, created together
//! - [`SequenceEvent`]: editable note or MIDI event with a stable [`EventId`]
//! - [`SequenceBuilder`]: quantizes and wraps editable events into an immutable [`Sequence`]
//! - [`RecentNoteOns`]: per-track memory of recent note-ons used for pre-recording
//! - [`ClipStatus`]: compact status string (`"pnE|0.000|0"`)
//!
//! # Example
//!
//! ```ignore
//! use cadenza_clip::{Clip, ClipOptions, SequenceEvent};
//! use cadenza_core::ReleasePool;
//!
//! let pool = ReleasePool::new();
//! let (mut clip, mut engine) = Clip::new(&pool, ClipOptions::default());
//! clip.set_sequence(4.0, vec![SequenceEvent::note(0.0, 60, 0.8, 1.0)])?;
//! clip.poll();
//! clip.play_now();
//!
//! // audio thread
//! engine.prepare_slice();
//! engine.process_slice(&ctx, &incoming, &recent, &mut out);
//! ```

pub mod error;
pub use error::{Error, Result};

mod event;
pub use event::{EventEdit, EventId, EventKind, SequenceEvent};

mod sequence;
pub use sequence::{Annotation, Sequence, TimedMessage};

mod builder;
pub use builder::{quantize, SequenceBuilder};

mod recording;
pub use recording::{
    RecentNoteOns, RecordedEvent, RecordingMerger, DEFAULT_RECORD_CAPACITY,
    PRE_RECORDING_THRESHOLD, RECENT_NOTE_ONS,
};

mod status;
pub use status::{ClipStatus, PlayStatus, RecordStatus};

mod clip;
pub use clip::{Clip, ClipContents, ClipEngine, ClipOptions, ClipState, PollReport, UNDO_LEVELS};

mod payload;
pub use payload::{SequenceEdit, SetSequence};
