//! MIDI utility functions

use smallvec::SmallVec;

use crate::{Error, Result};

#[inline]
pub fn velocity_to_gain(velocity: u8) -> f32 {
    velocity as f32 / 127.0
}

#[inline]
pub fn gain_to_velocity(gain: f32) -> u8 {
    (gain.clamp(0.0, 1.0) * 127.0).round() as u8
}

/// Parses comma-separated decimal bytes such as `"176,64,127"`.
pub fn parse_midi_bytes(text: &str) -> Result<SmallVec<[u8; 3]>> {
    let mut bytes = SmallVec::new();
    for part in text.split(',') {
        let part = part.trim();
        let byte = part
            .parse::<u8>()
            .map_err(|_| Error::InvalidBytes(format!("'{part}' in \"{text}\"")))?;
        bytes.push(byte);
    }
    Ok(bytes)
}

/// Inverse of [`parse_midi_bytes`].
pub fn format_midi_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
