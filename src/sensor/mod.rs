//! Sensor input for the occupancy agent.
//!
//! The agent core only needs a debounced boolean read per poll tick; this
//! module provides that behind the [`PulseSource`] trait. On Linux with the
//! `gpio` feature the real GPIO-backed source is used; everywhere else a
//! simulated source keeps the crate (and binary) compiling without hardware
//! dependencies.

pub mod sim;

#[cfg(all(target_os = "linux", feature = "gpio"))]
pub mod gpio;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which sensor variant is wired to the input pin.
///
/// Both present the same asserted-line contract to the sampler; the kind only
/// matters for wiring, logging and the batch payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    /// PIR motion sensor
    Motion,
    /// IR proximity / distance sensor
    Ir,
}

impl SensorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Motion => "motion",
            SensorKind::Ir => "ir",
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "motion" => Ok(SensorKind::Motion),
            "ir" => Ok(SensorKind::Ir),
            other => Err(format!("invalid sensor '{other}' (expected motion or ir)")),
        }
    }
}

/// One debounced read of the sensor line.
///
/// `true` means the line is asserted for this tick. Debouncing and any
/// hardware handshake are the source's responsibility, not the sampler's.
pub trait PulseSource {
    fn read(&mut self) -> bool;
}

/// Errors raised while bringing the sensor up. Always fatal: the agent must
/// not run a loop that silently reports zero events.
#[derive(Debug)]
pub enum SensorInitError {
    Gpio(String),
    InvalidPin(String),
}

impl std::fmt::Display for SensorInitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorInitError::Gpio(e) => write!(f, "GPIO error: {e}"),
            SensorInitError::InvalidPin(e) => write!(f, "Invalid pin: {e}"),
        }
    }
}

impl std::error::Error for SensorInitError {}

#[cfg(all(target_os = "linux", feature = "gpio"))]
pub use gpio::GpioPulseSource;

/// Platform-selected sensor type alias
#[cfg(all(target_os = "linux", feature = "gpio"))]
pub type Sensor = GpioPulseSource;

pub use sim::SimPulseSource;

/// Platform-selected sensor type alias
#[cfg(not(all(target_os = "linux", feature = "gpio")))]
pub type Sensor = SimPulseSource;
