//! The controller's runtime state and the only ways to change it.
//!
//! [`SystemState`] is a plain `Copy` value with clamping setters, so every
//! constructed value satisfies its bounds. [`SharedState`] wraps one inside
//! a critical-section mutex; each update is a read-modify-write under a
//! single lock, which keeps encoder input (control task) and network
//! messages (MQTT task) from losing each other's changes.

use core::cell::Cell;

use embassy_sync::blocking_mutex::CriticalSectionMutex;
use serde::{Deserialize, Serialize};

use super::commands::{Command, Config};
use super::ports::ControlPort;
use crate::config::SystemConfig;
use crate::drivers::encoder::EncoderEvent;

pub const SPEED_MAX: u8 = 100;
/// DS18B20 measurement range.
pub const THRESHOLD_MIN_C: f32 = -55.0;
pub const THRESHOLD_MAX_C: f32 = 125.0;

/// Who decides the fan speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Speed follows temperature.
    Auto,
    /// Speed follows the encoder / network `speed`.
    Manual,
}

impl Mode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Auto => Self::Manual,
            Self::Manual => Self::Auto,
        }
    }

    /// Wire name used in JSON messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }

    /// Exact, case-sensitive match on the wire name.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(Self::Auto),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// Snapshot of everything the control cycle decides from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemState {
    mode: Mode,
    manual_speed: u8,
    temp_threshold: f32,
    max_speed: u8,
}

impl Default for SystemState {
    fn default() -> Self {
        Self::new(30.0, SPEED_MAX)
    }
}

impl SystemState {
    /// Boot state: Auto mode, manual speed 0.
    pub fn new(temp_threshold: f32, max_speed: u8) -> Self {
        let mut state = Self {
            mode: Mode::Auto,
            manual_speed: 0,
            temp_threshold: 0.0,
            max_speed: 0,
        };
        state.set_temp_threshold(temp_threshold);
        state.set_max_speed(max_speed);
        state
    }

    pub fn from_config(config: &SystemConfig) -> Self {
        Self::new(config.temp_threshold_c, config.max_speed_percent)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn manual_speed(&self) -> u8 {
        self.manual_speed
    }

    pub fn temp_threshold(&self) -> f32 {
        self.temp_threshold
    }

    pub fn max_speed(&self) -> u8 {
        self.max_speed
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn set_manual_speed(&mut self, speed: u8) {
        self.manual_speed = speed.min(SPEED_MAX);
    }

    /// NaN is ignored.
    pub fn set_temp_threshold(&mut self, celsius: f32) {
        if !celsius.is_nan() {
            self.temp_threshold = celsius.clamp(THRESHOLD_MIN_C, THRESHOLD_MAX_C);
        }
    }

    pub fn set_max_speed(&mut self, speed: u8) {
        self.max_speed = speed.min(SPEED_MAX);
    }

    /// Encoder steps move `manual_speed` in either mode; the switch toggles
    /// the mode.
    pub fn apply_encoder(&mut self, event: EncoderEvent) {
        match event {
            EncoderEvent::Increment => {
                self.manual_speed = self.manual_speed.saturating_add(1).min(SPEED_MAX);
            }
            EncoderEvent::Decrement => {
                self.manual_speed = self.manual_speed.saturating_sub(1);
            }
            EncoderEvent::ButtonPress => self.mode = self.mode.toggled(),
        }
    }

    /// Mode first, then speed. The speed only counts if the resulting mode
    /// is Manual; an out-of-range speed is dropped, not clamped.
    pub fn apply_command(&mut self, command: &Command) {
        if let Some(mode) = command.mode {
            self.mode = mode;
        }
        if self.mode == Mode::Manual {
            if let Some(speed) = command.speed.filter(|s| *s <= SPEED_MAX) {
                self.manual_speed = speed;
            }
        }
    }

    pub fn apply_config(&mut self, config: &Config) {
        if let Some(threshold) = config.temp_threshold {
            self.set_temp_threshold(threshold);
        }
        if let Some(max_speed) = config.max_speed {
            self.set_max_speed(max_speed);
        }
    }
}

/// Before/after pair returned by every [`SharedState`] update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub before: SystemState,
    pub after: SystemState,
}

impl Transition {
    pub fn mode_changed(&self) -> bool {
        self.before.mode != self.after.mode
    }

    pub fn manual_speed_changed(&self) -> bool {
        self.before.manual_speed != self.after.manual_speed
    }

    pub fn settings_changed(&self) -> bool {
        self.before.temp_threshold != self.after.temp_threshold
            || self.before.max_speed != self.after.max_speed
    }

    /// The fan and the published status must be refreshed now rather than
    /// at the next periodic cycle.
    pub fn requires_republish(&self) -> bool {
        self.mode_changed() || (self.after.mode == Mode::Manual && self.manual_speed_changed())
    }
}

/// [`SystemState`] shared between tasks.
pub struct SharedState {
    inner: CriticalSectionMutex<Cell<SystemState>>,
}

impl SharedState {
    pub const fn new(initial: SystemState) -> Self {
        Self { inner: CriticalSectionMutex::new(Cell::new(initial)) }
    }

    /// Consistent copy of all four fields.
    pub fn snapshot(&self) -> SystemState {
        self.inner.lock(Cell::get)
    }

    fn update(&self, f: impl FnOnce(&mut SystemState)) -> Transition {
        self.inner.lock(|cell| {
            let before = cell.get();
            let mut after = before;
            f(&mut after);
            cell.set(after);
            Transition { before, after }
        })
    }

    pub fn apply_encoder(&self, event: EncoderEvent) -> Transition {
        self.update(|s| s.apply_encoder(event))
    }

    pub fn apply_command(&self, command: &Command) -> Transition {
        self.update(|s| s.apply_command(command))
    }

    pub fn apply_config(&self, config: &Config) -> Transition {
        self.update(|s| s.apply_config(config))
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(SystemState::default())
    }
}

impl ControlPort for SharedState {
    fn snapshot(&self) -> SystemState {
        SharedState::snapshot(self)
    }

    fn on_encoder(&self, event: EncoderEvent) -> Transition {
        self.apply_encoder(event)
    }

    fn on_command(&self, command: &Command) -> Transition {
        self.apply_command(command)
    }

    fn on_config(&self, config: &Config) -> Transition {
        self.apply_config(config)
    }
}
