//! Builder for configuring and constructing a [`Sequencer`] / [`SequencerEngine`] pair.

use std::sync::Arc;
use std::time::Duration;

use cadenza_clip::ClipOptions;
use cadenza_core::{MetronomeSettings, MusicalContext, ReleasePool};
use cadenza_midi::Channel;

use crate::config::SequencerConfig;
use crate::sequencer::{Sequencer, SequencerEngine, Settings};
use crate::track::Track;
use crate::Result;

/// Track `n` starts on MIDI channel `n + 1`. The release-pool sweeper is started unless
/// [`sweep_interval`](Self::sweep_interval) is set to `None`.
///
/// # Example
///
/// ```ignore
/// use cadenza::prelude::*;
///
/// let (mut sequencer, mut engine) = Sequencer::builder()
///     .sample_rate(48000.0)
///     .block_size(256)
///     .tracks(4)
///     .scenes(8)
///     .build()?;
///
/// // audio thread
/// let mut output = engine.new_output();
/// engine.process_block(&incoming, &mut output);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SequencerBuilder {
    config: SequencerConfig,
}

impl SequencerBuilder {
    /// Replaces the whole configuration.
    pub fn config(mut self, config: SequencerConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: 44100.0
    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.config.engine.sample_rate = sample_rate;
        self
    }

    /// Default: 512
    pub fn block_size(mut self, block_size: usize) -> Self {
        self.config.engine.block_size = block_size;
        self
    }

    /// Default: 120.0
    pub fn bpm(mut self, bpm: f64) -> Self {
        self.config.engine.bpm = bpm;
        self
    }

    /// Default: 4
    pub fn meter(mut self, meter: u32) -> Self {
        self.config.engine.meter = meter;
        self
    }

    /// Default: 8
    pub fn tracks(mut self, tracks: usize) -> Self {
        self.config.tracks = tracks;
        self
    }

    /// Default: 8
    pub fn scenes(mut self, scenes: usize) -> Self {
        self.config.scenes = scenes;
        self
    }

    pub fn fixed_length_bars(mut self, bars: u32) -> Self {
        self.config.fixed_length_bars = bars;
        self
    }

    pub fn fixed_velocity(mut self, velocity: Option<u8>) -> Self {
        self.config.fixed_velocity = velocity;
        self
    }

    /// Default: true
    pub fn record_automation(mut self, enabled: bool) -> Self {
        self.config.record_automation = enabled;
        self
    }

    /// Default: true
    pub fn send_midi_clock(mut self, enabled: bool) -> Self {
        self.config.send_midi_clock = enabled;
        self
    }

    pub fn metronome(mut self, settings: MetronomeSettings) -> Self {
        self.config.metronome = settings;
        self
    }

    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    pub fn clip_options(mut self, options: ClipOptions) -> Self {
        self.config.clip = options;
        self
    }

    /// Makes chance rolls reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.clip.seed = Some(seed);
        self
    }

    /// `None` disables the background sweeper.
    pub fn sweep_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    pub fn build(self) -> Result<(Sequencer, SequencerEngine)> {
        let config = self.config;
        config.validate()?;

        let pool = ReleasePool::new();
        let context = Arc::new(MusicalContext::new(config.engine.bpm, config.engine.meter));
        let settings = Arc::new(Settings::new(
            config.fixed_length_bars,
            config.fixed_velocity,
            config.record_automation,
            config.send_midi_clock,
        ));

        let (tracks, engines): (Vec<_>, Vec<_>) = (0..config.tracks)
            .map(|index| {
                let options = ClipOptions {
                    seed: config
                        .clip
                        .seed
                        .map(|seed| seed.wrapping_add((index * config.scenes) as u64)),
                    ..config.clip
                };
                Track::new(
                    config.scenes,
                    Some(Channel::from_u8(index as u8)),
                    &pool,
                    options,
                )
            })
            .unzip();

        let sweeper = config
            .sweep_interval
            .map(|interval| pool.start_sweeper(interval))
            .transpose()?;

        tracing::info!(
            tracks = config.tracks,
            scenes = config.scenes,
            sample_rate = config.engine.sample_rate,
            block_size = config.engine.block_size,
            "sequencer built"
        );

        let engine = SequencerEngine::from_parts(
            Arc::clone(&context),
            Arc::clone(&settings),
            engines,
            &config,
        );
        let sequencer = Sequencer::from_parts(context, settings, tracks, pool, sweeper);
        Ok((sequencer, engine))
    }
}
