//! Realtime sequencing kernel.
//!
//! # Primary API
//!
//! - [`Slice`] / [`BlockContext`]: the beat range one audio block covers and the per-block
//!   parameters handed to clip engines
//! - [`Playhead`]: per-clip play/stop cueing and local slice
//! - [`MusicalContext`]: tempo, meter, bar counting, count-in and metronome switch
//! - [`Metronome`] / [`MidiClock`]: sample-accurate click and clock rendering
//! - [`publish`]: lock-free snapshot hand-off to the audio thread, reclaimed by [`ReleasePool`]
//!
//! # Example
//!
//! ```ignore
//! use cadenza_core::{publication_channel, ReleasePool};
//! use std::sync::Arc;
//!
//! let pool = ReleasePool::new();
//! let (mut publisher, mut subscriber) = publication_channel(&pool);
//! publisher.publish(Arc::new(snapshot));
//!
//! // audio thread, block start
//! subscriber.try_pop_newest();
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::{validate_bpm, validate_meter, EngineConfig, MAX_BPM};

pub(crate) mod lockfree;
pub use lockfree::{AtomicCue, AtomicDouble, AtomicFlag, EdgeLatch};

mod slice;
pub use slice::{BlockContext, Slice};

mod playhead;
pub use playhead::Playhead;

pub(crate) mod transport;
pub use transport::{Metronome, MetronomeSettings, MidiClock, MusicalContext, CLOCK_PULSES_PER_BEAT};

pub mod publish;
pub use publish::{
    publication_channel, publication_channel_with_capacity, Publisher, Subscriber,
    DEFAULT_PUBLISH_CAPACITY, DEFAULT_RETIRE_CAPACITY,
};

pub mod release_pool;
pub use release_pool::{ReleasePool, SweeperGuard, DEFAULT_SWEEP_INTERVAL};
