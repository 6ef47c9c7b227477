//! RT-safe MIDI event types with sample-accurate timing.

use midi_msg::{Channel, ChannelVoiceMsg, ControlChange, MidiMsg, SystemRealTimeMsg};

use crate::{Error, Result};

/// Controller number of the sustain (damper) pedal.
pub const SUSTAIN_PEDAL_CC: u8 = 64;

/// Centred 14-bit pitch bend value.
pub const PITCH_BEND_CENTER: u16 = 8192;

/// RT-safe channel voice event with sample-accurate frame offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiEvent {
    /// Offset within the current block (0 = first sample).
    pub frame_offset: usize,
    pub channel: Channel,
    pub msg: ChannelVoiceMsg,
}

impl MidiEvent {
    #[inline]
    pub fn new(frame_offset: usize, channel: Channel, msg: ChannelVoiceMsg) -> Self {
        Self {
            frame_offset,
            channel,
            msg,
        }
    }

    #[inline]
    pub fn note_on(frame_offset: usize, channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(frame_offset, Channel::from_u8(channel), ChannelVoiceMsg::NoteOn { note, velocity })
    }

    #[inline]
    pub fn note_off(frame_offset: usize, channel: u8, note: u8, velocity: u8) -> Self {
        let msg = ChannelVoiceMsg::NoteOff { note, velocity };
        Self::new(frame_offset, Channel::from_u8(channel), msg)
    }

    #[inline]
    pub fn control_change(frame_offset: usize, channel: u8, cc: u8, value: u8) -> Self {
        let control = ControlChange::CC { control: cc, value };
        Self::new(
            frame_offset,
            Channel::from_u8(channel),
            ChannelVoiceMsg::ControlChange { control },
        )
    }

    /// `bend` is 14-bit, centred on [`PITCH_BEND_CENTER`].
    #[inline]
    pub fn pitch_bend(frame_offset: usize, channel: u8, bend: u16) -> Self {
        Self::new(frame_offset, Channel::from_u8(channel), ChannelVoiceMsg::PitchBend { bend })
    }

    /// Same message, different block position.
    #[inline]
    pub fn at(self, frame_offset: usize) -> Self {
        Self {
            frame_offset,
            ..self
        }
    }

    /// Same message, rewritten to another output channel.
    #[inline]
    pub fn on_channel(self, channel: Channel) -> Self {
        Self { channel, ..self }
    }

    #[inline]
    pub fn channel_num(&self) -> u8 {
        self.channel as u8
    }

    #[inline]
    pub fn is_note_on(&self) -> bool {
        matches!(self.msg, ChannelVoiceMsg::NoteOn { velocity, .. } if velocity > 0)
    }

    #[inline]
    pub fn is_note_off(&self) -> bool {
        matches!(
            self.msg,
            ChannelVoiceMsg::NoteOff { .. } | ChannelVoiceMsg::NoteOn { velocity: 0, .. }
        )
    }

    #[inline]
    pub fn note(&self) -> Option<u8> {
        match self.msg {
            ChannelVoiceMsg::NoteOn { note, .. }
            | ChannelVoiceMsg::NoteOff { note, .. }
            | ChannelVoiceMsg::PolyPressure { note, .. } => Some(note),
            _ => None,
        }
    }

    #[inline]
    pub fn velocity(&self) -> Option<u8> {
        match self.msg {
            ChannelVoiceMsg::NoteOn { velocity, .. }
            | ChannelVoiceMsg::NoteOff { velocity, .. } => Some(velocity),
            _ => None,
        }
    }

    /// Controller number and 7-bit value, for plain and high-res control changes.
    #[inline]
    pub fn controller(&self) -> Option<(u8, u8)> {
        match self.msg {
            ChannelVoiceMsg::ControlChange { control } => match control {
                ControlChange::CC { control, value } => Some((control, value)),
                ControlChange::CCHighRes {
                    control1, value, ..
                } => Some((control1, (value >> 7) as u8)),
                _ => None,
            },
            _ => None,
        }
    }

    #[inline]
    pub fn is_controller(&self) -> bool {
        matches!(self.msg, ChannelVoiceMsg::ControlChange { .. })
    }

    /// Sustain pedal state carried by this event, if it is a CC64.
    #[inline]
    pub fn sustain_pedal(&self) -> Option<bool> {
        match self.controller() {
            Some((SUSTAIN_PEDAL_CC, value)) => Some(value > 0),
            _ => None,
        }
    }

    #[inline]
    pub fn pitch_bend_value(&self) -> Option<u16> {
        match self.msg {
            ChannelVoiceMsg::PitchBend { bend } => Some(bend),
            _ => None,
        }
    }

    #[inline]
    pub fn is_pressure(&self) -> bool {
        matches!(
            self.msg,
            ChannelVoiceMsg::ChannelPressure { .. } | ChannelVoiceMsg::PolyPressure { .. }
        )
    }

    #[inline]
    pub fn to_midi_msg(&self) -> MidiMsg {
        MidiMsg::ChannelVoice {
            channel: self.channel,
            msg: self.msg,
        }
    }

    /// Wire bytes (allocates; control thread only).
    #[inline]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_midi_msg().to_midi()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with_offset(bytes, 0)
    }

    /// Decodes a channel voice message from its wire bytes.
    ///
    /// Control changes always decode to [`ControlChange::CC`] so that controller
    /// numbers survive a round trip unchanged.
    pub fn from_bytes_with_offset(bytes: &[u8], frame_offset: usize) -> Result<Self> {
        let status = *bytes
            .first()
            .ok_or_else(|| Error::InvalidBytes("empty message".into()))?;
        if status < 0x80 || status >= 0xF0 {
            return Err(Error::InvalidBytes(format!(
                "status byte {status:#04x} is not a channel voice message"
            )));
        }
        let data = |index: usize| -> Result<u8> {
            match bytes.get(index) {
                Some(&b) if b < 0x80 => Ok(b),
                Some(&b) => Err(Error::InvalidBytes(format!(
                    "data byte {b:#04x} has the high bit set"
                ))),
                None => Err(Error::InvalidBytes(format!(
                    "status {status:#04x} expects more than {} bytes",
                    bytes.len()
                ))),
            }
        };
        let channel = status & 0x0F;
        let msg = match status & 0xF0 {
            0x80 => ChannelVoiceMsg::NoteOff {
                note: data(1)?,
                velocity: data(2)?,
            },
            0x90 => ChannelVoiceMsg::NoteOn {
                note: data(1)?,
                velocity: data(2)?,
            },
            0xA0 => ChannelVoiceMsg::PolyPressure {
                note: data(1)?,
                pressure: data(2)?,
            },
            0xB0 => ChannelVoiceMsg::ControlChange {
                control: ControlChange::CC {
                    control: data(1)?,
                    value: data(2)?,
                },
            },
            0xC0 => ChannelVoiceMsg::ProgramChange { program: data(1)? },
            0xD0 => ChannelVoiceMsg::ChannelPressure { pressure: data(1)? },
            _ => ChannelVoiceMsg::PitchBend {
                bend: (data(1)? as u16) | ((data(2)? as u16) << 7),
            },
        };
        Ok(Self {
            frame_offset,
            channel: Channel::from_u8(channel),
            msg,
        })
    }
}

/// Realtime message kinds the sequencer emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockMessage {
    Tick,
    Start,
    Stop,
}

impl ClockMessage {
    /// Single status byte on the wire.
    #[inline]
    pub fn status_byte(self) -> u8 {
        match self {
            ClockMessage::Tick => 0xF8,
            ClockMessage::Start => 0xFA,
            ClockMessage::Stop => 0xFC,
        }
    }
}

/// System real-time message (clock, start, stop) placed inside a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockEvent {
    pub frame_offset: usize,
    pub msg: ClockMessage,
}

impl ClockEvent {
    #[inline]
    pub fn tick(frame_offset: usize) -> Self {
        Self {
            frame_offset,
            msg: ClockMessage::Tick,
        }
    }

    #[inline]
    pub fn start(frame_offset: usize) -> Self {
        Self {
            frame_offset,
            msg: ClockMessage::Start,
        }
    }

    #[inline]
    pub fn stop(frame_offset: usize) -> Self {
        Self {
            frame_offset,
            msg: ClockMessage::Stop,
        }
    }

    #[inline]
    pub fn is_tick(&self) -> bool {
        self.msg == ClockMessage::Tick
    }

    pub fn to_midi_msg(&self) -> MidiMsg {
        let msg = match self.msg {
            ClockMessage::Tick => SystemRealTimeMsg::TimingClock,
            ClockMessage::Start => SystemRealTimeMsg::Start,
            ClockMessage::Stop => SystemRealTimeMsg::Stop,
        };
        MidiMsg::SystemRealTime { msg }
    }
}
