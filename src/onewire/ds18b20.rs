//! DS18B20 digital thermometer, single device on the bus, parasite power off.
//!
//! Every transaction addresses the lone device with SKIP ROM. A measurement
//! is reset → SKIP ROM → CONVERT T → wait 750 ms → reset → SKIP ROM →
//! READ SCRATCHPAD → two data bytes (LSB first) holding a signed 12-bit
//! value in 1/16 °C.
//!
//! ## Slot timing
//!
//! | step            | low (µs) | released (µs)         |
//! |-----------------|----------|-----------------------|
//! | reset           | 480      | 70, sample, 410       |
//! | write 1         | 6        | 64                    |
//! | write 0         | 60       | 10                    |
//! | read            | 6        | 9, sample, 55         |
//!
//! A read takes about 750 ms of blocking delay. Call it from the control
//! task, never from an interrupt or a network callback.

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use super::BusLine;
use crate::app::ports::TemperaturePort;
use crate::error::{Result, SensorError};

// ── ROM / function commands ───────────────────────────────────

pub const SKIP_ROM: u8 = 0xCC;
pub const CONVERT_T: u8 = 0x44;
pub const READ_SCRATCHPAD: u8 = 0xBE;

/// Worst-case 12-bit conversion time.
pub const CONVERSION_TIME_MS: u32 = 750;

/// The conversion wait is served in slices of this length so the caller
/// can handle input in between.
pub const CONVERSION_SLICE_MS: u32 = 25;

/// Value reported in place of a temperature when the device is missing.
pub const SENTINEL_C: f32 = -127.0;

const LSB_CELSIUS: f32 = 0.0625;

// ── Slot timing (µs) ──────────────────────────────────────────

const RESET_LOW_US: u32 = 480;
const PRESENCE_SAMPLE_US: u32 = 70;
const RESET_RECOVERY_US: u32 = 410;

const WRITE_ONE_LOW_US: u32 = 6;
const WRITE_ONE_RECOVERY_US: u32 = 64;
const WRITE_ZERO_LOW_US: u32 = 60;
const WRITE_ZERO_RECOVERY_US: u32 = 10;

const READ_LOW_US: u32 = 6;
const READ_SAMPLE_US: u32 = 9;
const READ_RECOVERY_US: u32 = 55;

/// Outcome of one measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TemperatureReading {
    Celsius(f32),
    /// No presence pulse on one of the two resets.
    Fault,
}

impl TemperatureReading {
    /// Convert the raw scratchpad word (two's complement, 1/16 °C).
    pub fn from_raw(raw: i16) -> Self {
        Self::Celsius(f32::from(raw) * LSB_CELSIUS)
    }

    /// Temperature in °C, or [`SENTINEL_C`] on a fault.
    pub fn celsius(self) -> f32 {
        match self {
            Self::Celsius(c) => c,
            Self::Fault => SENTINEL_C,
        }
    }

    pub fn ok(self) -> Option<f32> {
        match self {
            Self::Celsius(c) => Some(c),
            Self::Fault => None,
        }
    }

    pub fn is_fault(self) -> bool {
        matches!(self, Self::Fault)
    }
}

/// Driver for a single DS18B20 on a [`BusLine`].
pub struct Ds18b20<L, D> {
    line: L,
    delay: D,
}

impl<L: BusLine, D: DelayNs> Ds18b20<L, D> {
    pub fn new(line: L, delay: D) -> Self {
        Self { line, delay }
    }

    /// Reset pulse followed by the presence check. `true` if a device
    /// pulled the line low in the presence window.
    pub fn reset(&mut self) -> bool {
        self.line.drive_low();
        self.delay.delay_us(RESET_LOW_US);
        self.line.release();
        self.delay.delay_us(PRESENCE_SAMPLE_US);
        let present = !self.line.sample_level();
        self.delay.delay_us(RESET_RECOVERY_US);
        present
    }

    pub fn write_bit(&mut self, bit: bool) {
        let (low, recovery) = if bit {
            (WRITE_ONE_LOW_US, WRITE_ONE_RECOVERY_US)
        } else {
            (WRITE_ZERO_LOW_US, WRITE_ZERO_RECOVERY_US)
        };
        self.line.drive_low();
        self.delay.delay_us(low);
        self.line.release();
        self.delay.delay_us(recovery);
    }

    pub fn read_bit(&mut self) -> bool {
        self.line.drive_low();
        self.delay.delay_us(READ_LOW_US);
        self.line.release();
        self.delay.delay_us(READ_SAMPLE_US);
        let bit = self.line.sample_level();
        self.delay.delay_us(READ_RECOVERY_US);
        bit
    }

    /// LSB first.
    pub fn write_byte(&mut self, byte: u8) {
        for i in 0..8 {
            self.write_bit(byte & (1 << i) != 0);
        }
    }

    /// LSB first.
    pub fn read_byte(&mut self) -> u8 {
        (0..8).fold(0u8, |acc, i| if self.read_bit() { acc | (1 << i) } else { acc })
    }

    /// Start a conversion. The result is ready [`CONVERSION_TIME_MS`] later.
    pub fn start_conversion(&mut self) -> Result<()> {
        if !self.reset() {
            return Err(SensorError::NoPresence.into());
        }
        self.write_byte(SKIP_ROM);
        self.write_byte(CONVERT_T);
        Ok(())
    }

    /// Read the raw temperature word from the scratchpad.
    pub fn read_raw(&mut self) -> Result<i16> {
        if !self.reset() {
            return Err(SensorError::NoPresence.into());
        }
        self.write_byte(SKIP_ROM);
        self.write_byte(READ_SCRATCHPAD);
        let lsb = self.read_byte();
        let msb = self.read_byte();
        Ok(i16::from_le_bytes([lsb, msb]))
    }

    fn measure(&mut self, idle: &mut dyn FnMut()) -> Result<i16> {
        self.start_conversion()?;
        let mut waited = 0;
        while waited < CONVERSION_TIME_MS {
            let slice = CONVERSION_SLICE_MS.min(CONVERSION_TIME_MS - waited);
            self.delay.delay_ms(slice);
            waited += slice;
            idle();
        }
        self.read_raw()
    }

    /// Full blocking measurement. Never panics; a missing device yields
    /// [`TemperatureReading::Fault`].
    pub fn read_temperature(&mut self) -> TemperatureReading {
        self.read_temperature_while(&mut || {})
    }

    /// [`read_temperature`](Self::read_temperature), calling `idle` after
    /// every slice of the conversion wait.
    pub fn read_temperature_while(&mut self, idle: &mut dyn FnMut()) -> TemperatureReading {
        match self.measure(idle) {
            Ok(raw) => {
                let reading = TemperatureReading::from_raw(raw);
                debug!("ds18b20: raw=0x{:04X} -> {:.4}°C", raw as u16, reading.celsius());
                reading
            }
            Err(e) => {
                warn!("ds18b20: {}", e);
                TemperatureReading::Fault
            }
        }
    }

    pub fn release(self) -> (L, D) {
        (self.line, self.delay)
    }
}

impl<L: BusLine, D: DelayNs> TemperaturePort for Ds18b20<L, D> {
    fn read_temperature(&mut self) -> TemperatureReading {
        Ds18b20::read_temperature(self)
    }

    fn read_temperature_while(&mut self, idle: &mut dyn FnMut()) -> TemperatureReading {
        Ds18b20::read_temperature_while(self, idle)
    }
}
