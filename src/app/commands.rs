//! Inbound requests from the network.
//!
//! Both message kinds are partial updates: a `None` field leaves the
//! corresponding setting untouched.

use super::state::Mode;

/// Operator command (`esp32/fan_control/command`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Command {
    /// Manual speed, 0–100. Only honoured when the resulting mode is
    /// Manual; parsing drops anything outside the range.
    pub speed: Option<u8>,
    pub mode: Option<Mode>,
}

impl Command {
    pub fn speed(speed: u8) -> Self {
        Self { speed: Some(speed), mode: None }
    }

    pub fn mode(mode: Mode) -> Self {
        Self { speed: None, mode: Some(mode) }
    }

    pub fn is_empty(&self) -> bool {
        self.speed.is_none() && self.mode.is_none()
    }
}

/// Tuning update (`esp32/fan_control/config`). Values arrive already clamped.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Config {
    pub temp_threshold: Option<f32>,
    pub max_speed: Option<u8>,
}
