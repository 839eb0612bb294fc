//! PWM fan driver.
//!
//! Speed is a percentage mapped onto the 8-bit LEDC duty of channel 0
//! (25 kHz). The driver does no policy; it is a dumb actuator owned by the
//! control task.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: writes the LEDC duty register via hw_init helpers.
//! On host/test: tracks the duty in memory only.

use crate::drivers::hw_init;

pub struct FanDriver {
    duty: u8,
}

impl FanDriver {
    pub fn new() -> Self {
        Self { duty: 0 }
    }

    /// Values above 100 are clamped.
    pub fn set_speed(&mut self, percent: u8) {
        let percent = percent.min(100);
        hw_init::ledc_set(hw_init::LEDC_CH_FAN, percent_to_ledc(percent));
        self.duty = percent;
    }

    pub fn stop(&mut self) {
        self.set_speed(0);
    }

    pub fn speed(&self) -> u8 {
        self.duty
    }

    pub fn is_running(&self) -> bool {
        self.duty > 0
    }
}

impl Default for FanDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Percentage to 8-bit duty, rounding down.
pub fn percent_to_ledc(percent: u8) -> u8 {
    (u16::from(percent.min(100)) * 255 / 100) as u8
}
