//! Error types for the MIDI subsystem.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid MIDI bytes: {0}")]
    InvalidBytes(String),
}

pub type Result<T> = std::result::Result<T, Error>;
