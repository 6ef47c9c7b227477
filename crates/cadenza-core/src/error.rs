//! Error types for cadenza-core.

use thiserror::Error;

/// Error type for cadenza-core operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid tempo: {0}. Must be greater than 0.0 and below 400.0 BPM")]
    InvalidTempo(f64),

    #[error("Invalid meter: {0}. Must be at least one beat per bar")]
    InvalidMeter(u32),

    #[error("Meter cannot change while counting in")]
    MeterLocked,

    #[error("Failed to spawn {name} thread: {reason}")]
    ThreadSpawn { name: String, reason: String },

    #[error("Invalid beat position: {0}. Must be finite and non-negative")]
    InvalidBeat(f64),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
