//! Pre-sized per-block event buffers.
//!
//! Storage is reserved once at construction; [`TimedBuffer::push`] never grows it. When the
//! buffer is full the event is rejected and the caller decides what to do (the sequencer simply
//! drops it).

use crate::event::{ClockEvent, MidiEvent};

/// Default per-block capacity for MIDI output buffers.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

/// Anything placed at a frame offset inside a block.
pub trait Timed: Copy {
    fn frame_offset(&self) -> usize;
}

impl Timed for MidiEvent {
    #[inline]
    fn frame_offset(&self) -> usize {
        self.frame_offset
    }
}

impl Timed for ClockEvent {
    #[inline]
    fn frame_offset(&self) -> usize {
        self.frame_offset
    }
}

/// Fixed-capacity event list kept sorted by frame offset.
///
/// Events at the same offset keep their insertion order.
#[derive(Debug, Clone)]
pub struct TimedBuffer<T: Timed> {
    events: Vec<T>,
    capacity: usize,
}

pub type MidiBuffer = TimedBuffer<MidiEvent>;
pub type ClockBuffer = TimedBuffer<ClockEvent>;

impl<T: Timed> TimedBuffer<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Inserts `event` after every event at or before its frame offset.
    ///
    /// Returns `false` when the buffer is full.
    #[inline]
    pub fn push(&mut self, event: T) -> bool {
        if self.events.len() >= self.capacity {
            return false;
        }
        let offset = event.frame_offset();
        match self.events.last() {
            Some(last) if last.frame_offset() > offset => {
                let index = self
                    .events
                    .partition_point(|e| e.frame_offset() <= offset);
                self.events.insert(index, event);
            }
            _ => self.events.push(event),
        }
        true
    }

    /// Copies events from `other`, stopping when full. Returns how many were copied.
    pub fn extend_from(&mut self, other: &TimedBuffer<T>) -> usize {
        let mut copied = 0;
        for event in other.iter() {
            if !self.push(*event) {
                break;
            }
            copied += 1;
        }
        copied
    }

    #[inline]
    pub fn clear(&mut self) {
        self.events.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.events.len() >= self.capacity
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.events.iter()
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.events
    }
}

impl<T: Timed> Default for TimedBuffer<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }
}

impl<'a, T: Timed> IntoIterator for &'a TimedBuffer<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
