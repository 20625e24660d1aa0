//! GPIO-backed pulse source for Raspberry Pi class devices.
//!
//! Reads a single BCM input pin through rppal. PIR and IR modules both hold
//! their output high while triggered, so one level read per tick is all the
//! sampler needs.

use crate::sensor::{PulseSource, SensorInitError, SensorKind};
use rppal::gpio::{Gpio, InputPin};
use std::time::Duration;

/// Settle time after pin setup before the sensor output is trustworthy.
const WARM_UP: Duration = Duration::from_secs(10);

/// A pulse source wired to a GPIO input pin.
pub struct GpioPulseSource {
    pin: InputPin,
    kind: SensorKind,
}

impl GpioPulseSource {
    /// Claim the pin and wait out the sensor warm-up.
    ///
    /// Blocks for [`WARM_UP`] before returning so the first poll tick never
    /// sees the sensor's power-on transient.
    pub fn init(kind: SensorKind, pin: u8) -> Result<Self, SensorInitError> {
        let gpio = Gpio::new().map_err(|e| SensorInitError::Gpio(e.to_string()))?;
        let pin = gpio
            .get(pin)
            .map_err(|e| SensorInitError::InvalidPin(e.to_string()))?
            .into_input();

        std::thread::sleep(WARM_UP);

        Ok(Self { pin, kind })
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }
}

impl PulseSource for GpioPulseSource {
    fn read(&mut self) -> bool {
        self.pin.is_high()
    }
}
