//! Bit-banged Dallas 1-Wire bus.
//!
//! The bus is a single open-drain line with a pull-up. The master either
//! drives it low or releases it and lets the pull-up (or a slave) decide the
//! level. [`BusLine`] captures exactly those three primitives so the DS18B20
//! protocol in [`ds18b20`] runs unchanged over a real GPIO or the host
//! simulation in [`sim`].

pub mod ds18b20;
#[cfg(not(target_os = "espidf"))]
pub mod sim;

use embedded_hal::digital::{InputPin, OutputPin};

/// One open-drain bus line.
pub trait BusLine {
    /// Pull the line low.
    fn drive_low(&mut self);
    /// Stop driving; the pull-up or a slave determines the level.
    fn release(&mut self);
    /// `true` when the line reads high.
    fn sample_level(&mut self) -> bool;
}

/// [`BusLine`] over any embedded-hal pin configured as open-drain
/// input/output, so that `set_high` releases rather than drives.
pub struct OpenDrainPin<P> {
    pin: P,
}

impl<P> OpenDrainPin<P>
where
    P: InputPin + OutputPin,
{
    pub fn new(mut pin: P) -> Self {
        // Idle state of the bus is released.
        let _ = pin.set_high();
        Self { pin }
    }

    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl<P> BusLine for OpenDrainPin<P>
where
    P: InputPin + OutputPin,
{
    fn drive_low(&mut self) {
        let _ = self.pin.set_low();
    }

    fn release(&mut self) {
        let _ = self.pin.set_high();
    }

    /// A pin error reads as high, which the protocol treats as "no slave".
    fn sample_level(&mut self) -> bool {
        self.pin.is_high().unwrap_or(true)
    }
}
