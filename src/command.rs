//! Typed control commands and their `/address` + string-parameter form.
//!
//! | address                           | parameters                          |
//! |-----------------------------------|-------------------------------------|
//! | `/transport/playStop`             |                                     |
//! | `/transport/setBpm`               | bpm                                 |
//! | `/transport/setMeter`             | beats per bar                       |
//! | `/metronome/on`, `/off`, `/onOff` |                                     |
//! | `/clip/play`, `/stop`, `/playStop`, `/recordOnOff`, `/clear`, `/double`, `/undo` | track, clip |
//! | `/clip/quantize`                  | track, clip, step                   |
//! | `/clip/setLength`                 | track, clip, beats                  |
//! | `/clip/setSequence`               | track, clip, JSON                   |
//! | `/clip/editSequence`              | track, clip, JSON                   |
//! | `/track/setInputMonitoring`       | track, `1`/`0`                      |
//! | `/track/setOutputChannel`         | track, channel 1-16 or `-1`         |
//! | `/scene/play`, `/scene/duplicate` | scene                               |
//! | `/settings/fixedLength`           | bars                                |
//! | `/settings/fixedVelocity`         | velocity 1-127 or `-1`              |
//! | `/settings/toggleRecordAutomation`|                                     |
//!
//! Track, clip and scene numbers are zero-based indices.

use std::str::FromStr;

use cadenza_clip::{SequenceEdit, SetSequence};
use cadenza_midi::Channel;

use crate::sequencer::{ClipAddress, Sequencer};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    TransportPlayStop,
    SetBpm(f64),
    SetMeter(u32),

    MetronomeOn,
    MetronomeOff,
    MetronomeToggle,

    ClipPlay(ClipAddress),
    ClipStop(ClipAddress),
    ClipPlayStop(ClipAddress),
    ClipRecordOnOff(ClipAddress),
    ClipClear(ClipAddress),
    ClipDouble(ClipAddress),
    ClipUndo(ClipAddress),
    ClipQuantize(ClipAddress, f64),
    ClipSetLength(ClipAddress, f64),
    ClipSetSequence(ClipAddress, SetSequence),
    ClipEditSequence(ClipAddress, SequenceEdit),

    TrackSetInputMonitoring { track: usize, enabled: bool },
    TrackSetOutputChannel { track: usize, channel: Option<Channel> },

    ScenePlay(usize),
    SceneDuplicate(usize),

    SetFixedLengthBars(u32),
    SetFixedVelocity(Option<u8>),
    ToggleRecordAutomation,
}

impl Command {
    /// Parses an address and its string parameters.
    ///
    /// Values are checked here (numbers, JSON payloads, ranges that do not depend on the
    /// sequencer layout); track/clip/scene indices are checked when the command is applied.
    pub fn parse<S: AsRef<str>>(address: &str, params: &[S]) -> Result<Command> {
        let args = Args { address, params };
        let command = match address {
            "/transport/playStop" => args.none(Command::TransportPlayStop)?,
            "/transport/setBpm" => {
                args.expect(1)?;
                Command::SetBpm(args.number(0)?)
            }
            "/transport/setMeter" => {
                args.expect(1)?;
                Command::SetMeter(args.number(0)?)
            }

            "/metronome/on" => args.none(Command::MetronomeOn)?,
            "/metronome/off" => args.none(Command::MetronomeOff)?,
            "/metronome/onOff" => args.none(Command::MetronomeToggle)?,

            "/clip/play" => Command::ClipPlay(args.clip(2)?),
            "/clip/stop" => Command::ClipStop(args.clip(2)?),
            "/clip/playStop" => Command::ClipPlayStop(args.clip(2)?),
            "/clip/recordOnOff" => Command::ClipRecordOnOff(args.clip(2)?),
            "/clip/clear" => Command::ClipClear(args.clip(2)?),
            "/clip/double" => Command::ClipDouble(args.clip(2)?),
            "/clip/undo" => Command::ClipUndo(args.clip(2)?),
            "/clip/quantize" => Command::ClipQuantize(args.clip(3)?, args.beats(2)?),
            "/clip/setLength" => Command::ClipSetLength(args.clip(3)?, args.beats(2)?),
            "/clip/setSequence" => {
                Command::ClipSetSequence(args.clip(3)?, SetSequence::from_json(args.get(2))?)
            }
            "/clip/editSequence" => {
                Command::ClipEditSequence(args.clip(3)?, SequenceEdit::from_json(args.get(2))?)
            }

            "/track/setInputMonitoring" => {
                args.expect(2)?;
                Command::TrackSetInputMonitoring {
                    track: args.number(0)?,
                    enabled: args.flag(1)?,
                }
            }
            "/track/setOutputChannel" => {
                args.expect(2)?;
                let channel = args
                    .optional::<u8>(1)?
                    .map(|channel| match channel {
                        1..=16 => Ok(Channel::from_u8(channel - 1)),
                        _ => Err(args.invalid(1)),
                    })
                    .transpose()?;
                Command::TrackSetOutputChannel {
                    track: args.number(0)?,
                    channel,
                }
            }

            "/scene/play" => {
                args.expect(1)?;
                Command::ScenePlay(args.number(0)?)
            }
            "/scene/duplicate" => {
                args.expect(1)?;
                Command::SceneDuplicate(args.number(0)?)
            }

            "/settings/fixedLength" => {
                args.expect(1)?;
                Command::SetFixedLengthBars(args.number(0)?)
            }
            "/settings/fixedVelocity" => {
                args.expect(1)?;
                let velocity = args
                    .optional::<u8>(0)?
                    .map(|velocity| match velocity {
                        1..=127 => Ok(velocity),
                        _ => Err(args.invalid(0)),
                    })
                    .transpose()?;
                Command::SetFixedVelocity(velocity)
            }
            "/settings/toggleRecordAutomation" => args.none(Command::ToggleRecordAutomation)?,

            _ => return Err(Error::UnknownAddress(address.to_string())),
        };
        Ok(command)
    }
}

struct Args<'a, S> {
    address: &'a str,
    params: &'a [S],
}

impl<S: AsRef<str>> Args<'_, S> {
    fn expect(&self, expected: usize) -> Result<()> {
        if self.params.len() == expected {
            Ok(())
        } else {
            Err(Error::ParameterCount {
                address: self.address.to_string(),
                expected,
                got: self.params.len(),
            })
        }
    }

    fn none(&self, command: Command) -> Result<Command> {
        self.expect(0).map(|()| command)
    }

    fn get(&self, index: usize) -> &str {
        self.params[index].as_ref().trim()
    }

    fn invalid(&self, index: usize) -> Error {
        Error::InvalidParameter {
            address: self.address.to_string(),
            value: self.get(index).to_string(),
        }
    }

    fn number<T: FromStr>(&self, index: usize) -> Result<T> {
        self.get(index).parse().map_err(|_| self.invalid(index))
    }

    /// `-1` means none.
    fn optional<T: FromStr>(&self, index: usize) -> Result<Option<T>> {
        if self.get(index) == "-1" {
            Ok(None)
        } else {
            self.number(index).map(Some)
        }
    }

    fn flag(&self, index: usize) -> Result<bool> {
        match self.get(index) {
            "1" | "true" => Ok(true),
            "0" | "false" => Ok(false),
            _ => Err(self.invalid(index)),
        }
    }

    /// A finite, non-negative beat value.
    fn beats(&self, index: usize) -> Result<f64> {
        let value: f64 = self.number(index)?;
        if value.is_finite() && value >= 0.0 {
            Ok(value)
        } else {
            Err(self.invalid(index))
        }
    }

    /// Track and clip from the first two of `expected` parameters.
    fn clip(&self, expected: usize) -> Result<ClipAddress> {
        self.expect(expected)?;
        Ok(ClipAddress::new(self.number(0)?, self.number(1)?))
    }
}

impl Sequencer {
    /// Applies a command.
    pub fn apply(&mut self, command: Command) -> Result<()> {
        tracing::debug!(?command, "applying command");
        match command {
            Command::TransportPlayStop => self.toggle_play_stop(),
            Command::SetBpm(bpm) => self.set_bpm(bpm)?,
            Command::SetMeter(meter) => self.set_meter(meter)?,

            Command::MetronomeOn => self.set_metronome(true),
            Command::MetronomeOff => self.set_metronome(false),
            Command::MetronomeToggle => {
                self.toggle_metronome();
            }

            Command::ClipPlay(address) => self.play_clip(address)?,
            Command::ClipStop(address) => self.stop_clip(address)?,
            Command::ClipPlayStop(address) => self.play_stop_clip(address)?,
            Command::ClipRecordOnOff(address) => self.toggle_record_clip(address)?,
            Command::ClipClear(address) => self.clip_mut(address)?.clear(),
            Command::ClipDouble(address) => self.clip_mut(address)?.double(),
            Command::ClipUndo(address) => {
                self.clip_mut(address)?.undo();
            }
            Command::ClipQuantize(address, step) => self.clip_mut(address)?.set_quantization(step)?,
            Command::ClipSetLength(address, length) => self.clip_mut(address)?.set_length(length)?,
            Command::ClipSetSequence(address, payload) => payload.apply(self.clip_mut(address)?)?,
            Command::ClipEditSequence(address, edit) => {
                edit.apply(self.clip_mut(address)?)?;
            }

            Command::TrackSetInputMonitoring { track, enabled } => {
                self.set_input_monitoring(track, enabled)?
            }
            Command::TrackSetOutputChannel { track, channel } => {
                self.set_output_channel(track, channel)?
            }

            Command::ScenePlay(scene) => self.play_scene(scene)?,
            Command::SceneDuplicate(scene) => {
                self.duplicate_scene(scene)?;
            }

            Command::SetFixedLengthBars(bars) => self.set_fixed_length_bars(bars)?,
            Command::SetFixedVelocity(velocity) => self.set_fixed_velocity(velocity)?,
            Command::ToggleRecordAutomation => {
                self.toggle_record_automation();
            }
        }
        Ok(())
    }

    /// Parses and applies an `/address` command.
    pub fn handle<S: AsRef<str>>(&mut self, address: &str, params: &[S]) -> Result<()> {
        let command = Command::parse(address, params)?;
        self.apply(command)
    }
}
