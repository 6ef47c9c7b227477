//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Upper bound (exclusive) for the global tempo.
pub const MAX_BPM: f64 = 400.0;

/// Configuration shared by the control and realtime halves of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: f64,
    pub block_size: usize,
    pub bpm: f64,
    /// Beats per bar.
    pub meter: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            block_size: 512,
            bpm: 120.0,
            meter: 4,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(8000.0..=384000.0).contains(&self.sample_rate) {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if self.block_size == 0 || self.block_size > 8192 {
            return Err(Error::InvalidConfig(format!(
                "block_size {} out of range (1-8192 samples)",
                self.block_size
            )));
        }
        validate_bpm(self.bpm)?;
        validate_meter(self.meter)
    }

    /// Samples per beat at the configured tempo.
    #[inline]
    pub fn samples_per_beat(&self) -> f64 {
        60.0 * self.sample_rate / self.bpm
    }
}

#[inline]
pub fn validate_bpm(bpm: f64) -> Result<()> {
    if bpm > 0.0 && bpm < MAX_BPM {
        Ok(())
    } else {
        Err(Error::InvalidTempo(bpm))
    }
}

#[inline]
pub fn validate_meter(meter: u32) -> Result<()> {
    if meter == 0 {
        Err(Error::InvalidMeter(meter))
    } else {
        Ok(())
    }
}
