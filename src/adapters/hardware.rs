//! Hardware adapter: bridges the sensor and the fan to the domain ports.
//!
//! Owns the DS18B20 driver and the [`FanDriver`], exposing them through
//! [`TemperaturePort`] and [`ActuatorPort`]. On non-espidf targets the fan
//! driver's LEDC writes are no-ops and the sensor runs on the simulated bus.

use embedded_hal::delay::DelayNs;

use crate::app::ports::{ActuatorPort, TemperaturePort};
use crate::drivers::fan::FanDriver;
use crate::onewire::BusLine;
use crate::onewire::ds18b20::{Ds18b20, TemperatureReading};

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<L, D> {
    sensor: Ds18b20<L, D>,
    fan: FanDriver,
}

impl<L: BusLine, D: DelayNs> HardwareAdapter<L, D> {
    pub fn new(sensor: Ds18b20<L, D>, fan: FanDriver) -> Self {
        Self { sensor, fan }
    }

    pub fn fan(&self) -> &FanDriver {
        &self.fan
    }
}

// ── TemperaturePort implementation ────────────────────────────

impl<L: BusLine, D: DelayNs> TemperaturePort for HardwareAdapter<L, D> {
    fn read_temperature(&mut self) -> TemperatureReading {
        self.sensor.read_temperature()
    }

    fn read_temperature_while(&mut self, idle: &mut dyn FnMut()) -> TemperatureReading {
        self.sensor.read_temperature_while(idle)
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<L: BusLine, D: DelayNs> ActuatorPort for HardwareAdapter<L, D> {
    fn set_fan_duty(&mut self, percent: u8) {
        self.fan.set_speed(percent);
    }

    fn fan_duty(&self) -> u8 {
        self.fan.speed()
    }
}
