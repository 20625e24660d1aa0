//! Simulated pulse source for non-GPIO builds and tests.
//!
//! This exists so the crate (and binary) can compile off-device without
//! pulling in GPIO dependencies. The idle variant never asserts the line;
//! the scripted variant replays a fixed tick-by-tick trace.

use crate::sensor::{PulseSource, SensorInitError, SensorKind};
use std::collections::VecDeque;

/// A pulse source backed by a script instead of hardware.
pub struct SimPulseSource {
    script: VecDeque<bool>,
}

impl SimPulseSource {
    /// Create a source whose line is never asserted.
    pub fn idle() -> Self {
        Self {
            script: VecDeque::new(),
        }
    }

    /// Create a source that replays the given per-tick levels, then stays low.
    pub fn from_script(levels: impl IntoIterator<Item = bool>) -> Self {
        Self {
            script: levels.into_iter().collect(),
        }
    }

    /// Mirror of the hardware source's constructor so `Sensor::init` works on
    /// any platform. The pin number is accepted but unused.
    pub fn init(_kind: SensorKind, _pin: u8) -> Result<Self, SensorInitError> {
        Ok(Self::idle())
    }

    /// Ticks remaining in the script.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl PulseSource for SimPulseSource {
    fn read(&mut self) -> bool {
        self.script.pop_front().unwrap_or(false)
    }
}
