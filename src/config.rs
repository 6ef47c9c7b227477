//! Sequencer configuration.

use std::time::Duration;

use cadenza_clip::ClipOptions;
use cadenza_core::{EngineConfig, MetronomeSettings, DEFAULT_SWEEP_INTERVAL};
use cadenza_midi::DEFAULT_BUFFER_CAPACITY;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const MAX_TRACKS: usize = 8;
pub const MAX_SCENES: usize = 8;

/// Everything needed to build a [`Sequencer`](crate::Sequencer) pair.
///
/// Hosts may load this from their own settings files; every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    pub engine: EngineConfig,
    pub tracks: usize,
    /// Clip slots per track.
    pub scenes: usize,
    /// Bars given to an empty clip when recording is armed. 0 disables fixed length.
    pub fixed_length_bars: u32,
    /// Velocity forced onto incoming notes.
    pub fixed_velocity: Option<u8>,
    pub record_automation: bool,
    pub send_midi_clock: bool,
    pub metronome: MetronomeSettings,
    /// Per-block capacity of every output buffer.
    pub buffer_capacity: usize,
    pub clip: ClipOptions,
    /// `None` leaves sweeping to the host ([`Sequencer::sweep`](crate::Sequencer::sweep)).
    #[serde(with = "sweep_interval_ms")]
    pub sweep_interval: Option<Duration>,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            tracks: MAX_TRACKS,
            scenes: MAX_SCENES,
            fixed_length_bars: 0,
            fixed_velocity: None,
            record_automation: true,
            send_midi_clock: true,
            metronome: MetronomeSettings::default(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            clip: ClipOptions::default(),
            sweep_interval: Some(DEFAULT_SWEEP_INTERVAL),
        }
    }
}

impl SequencerConfig {
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        if self.tracks == 0 || self.tracks > MAX_TRACKS {
            return Err(Error::InvalidConfig(format!(
                "tracks {} out of range (1-{MAX_TRACKS})",
                self.tracks
            )));
        }
        if self.scenes == 0 || self.scenes > MAX_SCENES {
            return Err(Error::InvalidConfig(format!(
                "scenes {} out of range (1-{MAX_SCENES})",
                self.scenes
            )));
        }
        if let Some(velocity) = self.fixed_velocity {
            validate_velocity(velocity)?;
        }
        if self.metronome.channel > 15 {
            return Err(Error::InvalidConfig(format!(
                "metronome channel {} out of range (0-15)",
                self.metronome.channel
            )));
        }
        if self.buffer_capacity == 0 {
            return Err(Error::InvalidConfig("buffer_capacity must be non-zero".into()));
        }
        if self.clip.publish_capacity == 0 || self.clip.record_capacity == 0 {
            return Err(Error::InvalidConfig(
                "clip ring capacities must be non-zero".into(),
            ));
        }
        if self.sweep_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(Error::InvalidConfig("sweep_interval must be non-zero".into()));
        }
        Ok(())
    }
}

pub(crate) fn validate_velocity(velocity: u8) -> Result<()> {
    if velocity == 0 || velocity > 127 {
        Err(Error::InvalidConfig(format!(
            "fixed velocity {velocity} out of range (1-127)"
        )))
    } else {
        Ok(())
    }
}

mod sweep_interval_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(interval) => serializer.serialize_some(&(interval.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
