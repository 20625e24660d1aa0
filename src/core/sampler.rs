//! Per-tick sampling of the sensor line.
//!
//! Counting is level-triggered: every poll tick with the line asserted is one
//! event, at most one event per tick. Edge counting (one event per rising
//! edge, however long the line stays high) is a deliberately different policy
//! and is not what this agent implements.

use crate::sensor::PulseSource;

/// What one poll tick observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    EventObserved,
    NoEvent,
}

impl Observation {
    pub fn is_event(&self) -> bool {
        matches!(self, Observation::EventObserved)
    }
}

/// Turns raw line reads into at most one observation per tick.
pub struct Sampler<S: PulseSource> {
    source: S,
}

impl<S: PulseSource> Sampler<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Consume one read from the source. Called once per poll tick.
    pub fn sample(&mut self) -> Observation {
        if self.source.read() {
            Observation::EventObserved
        } else {
            Observation::NoEvent
        }
    }
}
