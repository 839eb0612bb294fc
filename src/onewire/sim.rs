//! Host simulation of a DS18B20 on a 1-Wire bus.
//!
//! The model runs on a virtual clock that only [`SimDelay`] advances, so a
//! full 750 ms measurement completes instantly in tests. It decodes the
//! master's waveform the way the real part does:
//!
//! - a low pulse of 480 µs or more is a reset; a present device answers
//!   with a presence pulse from 15 µs to 135 µs after release,
//! - in a write slot, a low pulse shorter than 15 µs is a 1, longer is a 0,
//! - in a read slot, a 0 bit is the device holding the line low for 30 µs
//!   after the master's falling edge.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;

use super::BusLine;
use super::ds18b20::{CONVERSION_TIME_MS, CONVERT_T, READ_SCRATCHPAD, SKIP_ROM};

const NS_PER_US: u64 = 1_000;

const RESET_MIN_NS: u64 = 480 * NS_PER_US;
const WRITE_ZERO_MIN_NS: u64 = 15 * NS_PER_US;
const PRESENCE_START_NS: u64 = 15 * NS_PER_US;
const PRESENCE_END_NS: u64 = 135 * NS_PER_US;
const READ_ZERO_HOLD_NS: u64 = 30 * NS_PER_US;

/// Power-on scratchpad contents (85 °C).
const POWER_ON_RAW: i16 = 0x0550;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for a reset.
    Idle,
    /// Reset seen, expecting a ROM command.
    Rom,
    /// ROM command accepted, expecting a function command.
    Function,
    /// Shifting scratchpad bits out.
    Transmit,
}

struct Device {
    now_ns: u64,
    present: bool,
    vanish_after_conversion: bool,

    raw: i16,
    scratchpad_raw: i16,
    conversion_ready_at: Option<u64>,
    conversions: u32,

    phase: Phase,
    master_low_since: Option<u64>,
    presence_window: Option<(u64, u64)>,
    slave_low_until: u64,
    rx_byte: u8,
    rx_bits: u8,
    tx_bits: VecDeque<bool>,

    received: Vec<u8>,
    low_pulses_ns: Vec<u64>,
    last_fall_ns: u64,
    samples_ns: Vec<u64>,
}

impl Device {
    fn new(present: bool, raw: i16) -> Self {
        Self {
            now_ns: 0,
            present,
            vanish_after_conversion: false,
            raw,
            scratchpad_raw: POWER_ON_RAW,
            conversion_ready_at: None,
            conversions: 0,
            phase: Phase::Idle,
            master_low_since: None,
            presence_window: None,
            slave_low_until: 0,
            rx_byte: 0,
            rx_bits: 0,
            tx_bits: VecDeque::new(),
            received: Vec::new(),
            low_pulses_ns: Vec::new(),
            last_fall_ns: 0,
            samples_ns: Vec::new(),
        }
    }

    fn falling_edge(&mut self) {
        if self.master_low_since.is_some() {
            return;
        }
        self.master_low_since = Some(self.now_ns);
        self.last_fall_ns = self.now_ns;

        if self.phase == Phase::Transmit {
            // Bits beyond the scratchpad read back as 1.
            let bit = self.tx_bits.pop_front().unwrap_or(true);
            if !bit {
                self.slave_low_until = self.now_ns + READ_ZERO_HOLD_NS;
            }
        }
    }

    fn rising_edge(&mut self) {
        let Some(since) = self.master_low_since.take() else {
            return;
        };
        let width = self.now_ns - since;
        self.low_pulses_ns.push(width);

        if width >= RESET_MIN_NS {
            self.on_reset();
            return;
        }

        if matches!(self.phase, Phase::Rom | Phase::Function) {
            let bit = width < WRITE_ZERO_MIN_NS;
            if bit {
                self.rx_byte |= 1 << self.rx_bits;
            }
            self.rx_bits += 1;
            if self.rx_bits == 8 {
                let byte = self.rx_byte;
                self.rx_byte = 0;
                self.rx_bits = 0;
                self.on_byte(byte);
            }
        }
    }

    fn on_reset(&mut self) {
        self.rx_byte = 0;
        self.rx_bits = 0;
        self.tx_bits.clear();
        if self.present {
            self.presence_window = Some((
                self.now_ns + PRESENCE_START_NS,
                self.now_ns + PRESENCE_END_NS,
            ));
            self.phase = Phase::Rom;
        } else {
            self.presence_window = None;
            self.phase = Phase::Idle;
        }
    }

    fn on_byte(&mut self, byte: u8) {
        self.received.push(byte);
        self.phase = match (self.phase, byte) {
            (Phase::Rom, SKIP_ROM) => Phase::Function,
            (Phase::Function, CONVERT_T) => {
                self.conversions += 1;
                self.conversion_ready_at =
                    Some(self.now_ns + u64::from(CONVERSION_TIME_MS) * 1_000 * NS_PER_US);
                if self.vanish_after_conversion {
                    self.present = false;
                }
                Phase::Idle
            }
            (Phase::Function, READ_SCRATCHPAD) => {
                self.latch_conversion();
                self.load_scratchpad();
                Phase::Transmit
            }
            _ => Phase::Idle,
        };
    }

    fn latch_conversion(&mut self) {
        if let Some(ready_at) = self.conversion_ready_at {
            if self.now_ns >= ready_at {
                self.scratchpad_raw = self.raw;
                self.conversion_ready_at = None;
            }
        }
    }

    fn load_scratchpad(&mut self) {
        let [lsb, msb] = self.scratchpad_raw.to_le_bytes();
        // Temperature word, then TH, TL, config and reserved bytes.
        let bytes = [lsb, msb, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10];
        self.tx_bits = bytes
            .iter()
            .flat_map(|b| (0..8).map(move |i| b & (1 << i) != 0))
            .collect();
    }

    /// Master sample: recorded relative to the start of the current slot.
    fn sample(&mut self) -> bool {
        self.samples_ns.push(self.now_ns - self.last_fall_ns);
        self.line_is_high()
    }

    fn line_is_high(&self) -> bool {
        let presence = self
            .presence_window
            .is_some_and(|(start, end)| (start..end).contains(&self.now_ns));
        let slave_low = presence || self.now_ns < self.slave_low_until;
        !(self.master_low_since.is_some() || slave_low)
    }
}

/// A simulated DS18B20 plus the bus it sits on.
///
/// Hand [`SimDs18b20::line`] and [`SimDs18b20::delay`] to the driver and
/// keep this handle to steer and inspect the device.
pub struct SimDs18b20 {
    device: Rc<RefCell<Device>>,
}

impl SimDs18b20 {
    /// Present device reporting `celsius`, rounded to 1/16 °C.
    pub fn new(celsius: f32) -> Self {
        Self::with_raw(celsius_to_raw(celsius))
    }

    pub fn with_raw(raw: i16) -> Self {
        Self { device: Rc::new(RefCell::new(Device::new(true, raw))) }
    }

    /// Bus with nothing attached.
    pub fn absent() -> Self {
        Self { device: Rc::new(RefCell::new(Device::new(false, 0))) }
    }

    pub fn line(&self) -> SimLine {
        SimLine { device: Rc::clone(&self.device) }
    }

    pub fn delay(&self) -> SimDelay {
        SimDelay { device: Rc::clone(&self.device) }
    }

    pub fn set_temperature(&self, celsius: f32) {
        self.set_raw(celsius_to_raw(celsius));
    }

    pub fn set_raw(&self, raw: i16) {
        self.device.borrow_mut().raw = raw;
    }

    pub fn set_present(&self, present: bool) {
        self.device.borrow_mut().present = present;
    }

    /// Drop off the bus right after the next CONVERT T.
    pub fn vanish_after_conversion(&self) {
        self.device.borrow_mut().vanish_after_conversion = true;
    }

    /// Every command byte the device has decoded.
    pub fn received(&self) -> Vec<u8> {
        self.device.borrow().received.clone()
    }

    pub fn conversions(&self) -> u32 {
        self.device.borrow().conversions
    }

    /// Virtual time elapsed on the bus.
    pub fn elapsed_us(&self) -> u64 {
        self.device.borrow().now_ns / NS_PER_US
    }

    /// Width of every master low pulse, in µs.
    pub fn low_pulses_us(&self) -> Vec<u64> {
        self.device
            .borrow()
            .low_pulses_ns
            .iter()
            .map(|ns| ns / NS_PER_US)
            .collect()
    }
}

impl SimDs18b20 {
    /// When each master sample fell, in µs after the falling edge that
    /// opened its slot.
    pub fn sample_offsets_us(&self) -> Vec<u64> {
        self.device
            .borrow()
            .samples_ns
            .iter()
            .map(|ns| ns / NS_PER_US)
            .collect()
    }
}

/// Nearest raw 1/16 °C step.
pub fn celsius_to_raw(celsius: f32) -> i16 {
    (celsius * 16.0).round() as i16
}

/// Master side of the simulated bus.
pub struct SimLine {
    device: Rc<RefCell<Device>>,
}

impl BusLine for SimLine {
    fn drive_low(&mut self) {
        self.device.borrow_mut().falling_edge();
    }

    fn release(&mut self) {
        self.device.borrow_mut().rising_edge();
    }

    fn sample_level(&mut self) -> bool {
        self.device.borrow_mut().sample()
    }
}

/// Advances the simulation clock instead of sleeping.
pub struct SimDelay {
    device: Rc<RefCell<Device>>,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.device.borrow_mut().now_ns += u64::from(ns);
    }

    fn delay_us(&mut self, us: u32) {
        self.device.borrow_mut().now_ns += u64::from(us) * NS_PER_US;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.device.borrow_mut().now_ns += u64::from(ms) * 1_000 * NS_PER_US;
    }
}
