//! Compact clip status, e.g. `"pnE|0.000|0"`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayStatus {
    Stopped,
    CuedToPlay,
    Playing,
    CuedToStop,
}

impl PlayStatus {
    pub fn as_char(self) -> char {
        match self {
            Self::Stopped => 's',
            Self::CuedToPlay => 'c',
            Self::Playing => 'p',
            Self::CuedToStop => 'C',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    None,
    CuedToRecord,
    Recording,
    CuedToStopRecording,
}

impl RecordStatus {
    pub fn as_char(self) -> char {
        match self {
            Self::None => 'n',
            Self::CuedToRecord => 'w',
            Self::Recording => 'r',
            Self::CuedToStopRecording => 'W',
        }
    }
}

/// Snapshot of a clip's observable state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipStatus {
    pub play: PlayStatus,
    pub record: RecordStatus,
    pub length: f64,
    pub quantization: f64,
}

impl ClipStatus {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0.0
    }
}

impl fmt::Display for ClipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}|{:.3}|{}",
            self.play.as_char(),
            self.record.as_char(),
            if self.is_empty() { 'E' } else { 'e' },
            self.length,
            self.quantization
        )
    }
}
