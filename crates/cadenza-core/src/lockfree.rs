//! Lock-free primitives shared between the control and realtime threads.

use std::sync::atomic::{AtomicBool, Ordering};

use atomic_float::AtomicF64;

/// Cache-line aligned atomic bool.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicFlag {
    value: AtomicBool,
}

impl AtomicFlag {
    pub fn new(value: bool) -> Self {
        Self {
            value: AtomicBool::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::Release);
    }

    #[inline]
    pub fn swap(&self, value: bool) -> bool {
        self.value.swap(value, Ordering::AcqRel)
    }

    /// Inverts the flag, returning the new value.
    #[inline]
    pub fn toggle(&self) -> bool {
        !self.value.fetch_xor(true, Ordering::AcqRel)
    }
}

impl Clone for AtomicFlag {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}

impl Default for AtomicFlag {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Cache-line aligned atomic f64.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicDouble {
    value: AtomicF64,
}

impl AtomicDouble {
    pub fn new(value: f64) -> Self {
        Self {
            value: AtomicF64::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> f64 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: f64) {
        self.value.store(value, Ordering::Release);
    }

    #[inline]
    pub fn swap(&self, value: f64) -> f64 {
        self.value.swap(value, Ordering::AcqRel)
    }
}

impl Clone for AtomicDouble {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}

impl Default for AtomicDouble {
    fn default() -> Self {
        Self::new(0.0)
    }
}

const DISARMED: f64 = -1.0;

/// A single-shot beat position. Armed when the stored value is non-negative.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicCue {
    position: AtomicF64,
}

impl AtomicCue {
    pub fn new() -> Self {
        Self {
            position: AtomicF64::new(DISARMED),
        }
    }

    /// Arms the cue at `position`. Negative positions disarm it.
    #[inline]
    pub fn arm(&self, position: f64) {
        let value = if position >= 0.0 { position } else { DISARMED };
        self.position.store(value, Ordering::Release);
    }

    #[inline]
    pub fn clear(&self) {
        self.position.store(DISARMED, Ordering::Release);
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.position.load(Ordering::Acquire) >= 0.0
    }

    #[inline]
    pub fn get(&self) -> Option<f64> {
        let value = self.position.load(Ordering::Acquire);
        (value >= 0.0).then_some(value)
    }

    /// Cue position; the cue must be armed.
    #[inline]
    pub fn position(&self) -> f64 {
        let value = self.position.load(Ordering::Acquire);
        debug_assert!(value >= 0.0, "reading a disarmed cue");
        value
    }
}

impl Default for AtomicCue {
    fn default() -> Self {
        Self::new()
    }
}

/// Edge-triggered flag: reports a transition exactly once.
#[derive(Debug, Default)]
#[repr(align(64))]
pub struct EdgeLatch {
    fired: AtomicBool,
}

impl EdgeLatch {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn set(&self) {
        self.fired.store(true, Ordering::Release);
    }

    #[inline]
    pub fn reset(&self) {
        self.fired.store(false, Ordering::Release);
    }

    /// Returns whether the latch was set, clearing it.
    #[inline]
    pub fn take(&self) -> bool {
        self.fired.swap(false, Ordering::AcqRel)
    }

    /// Non-consuming read.
    #[inline]
    pub fn peek(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}
