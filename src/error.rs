//! Centralized error type for the cadenza umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] cadenza_core::Error),

    #[error("MIDI: {0}")]
    Midi(#[from] cadenza_midi::Error),

    #[error("Clip: {0}")]
    Clip(#[from] cadenza_clip::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("No track {0}")]
    TrackNotFound(usize),

    #[error("No clip {clip} on track {track}")]
    ClipNotFound { track: usize, clip: usize },

    #[error("No scene {0}")]
    SceneNotFound(usize),

    #[error("Unknown command address: {0}")]
    UnknownAddress(String),

    #[error("{address}: expected {expected} parameter(s), got {got}")]
    ParameterCount {
        address: String,
        expected: usize,
        got: usize,
    },

    #[error("{address}: invalid parameter {value:?}")]
    InvalidParameter { address: String, value: String },
}

pub type Result<T> = std::result::Result<T, Error>;
