//! Error types for clip editing.

use thiserror::Error;

use crate::event::EventId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid clip length: {0}. Must be finite and non-negative")]
    InvalidLength(f64),

    #[error("Invalid quantization step: {0}. Must be finite and non-negative")]
    InvalidQuantization(f64),

    #[error("No sequence event with id {0}")]
    EventNotFound(EventId),

    #[error("Invalid sequence event: {0}")]
    InvalidEvent(String),

    #[error(transparent)]
    Midi(#[from] cadenza_midi::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
