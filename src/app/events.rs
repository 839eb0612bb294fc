//! Outbound application events.
//!
//! The [`ControlService`](super::service::ControlService) emits these
//! through the [`EventSink`](super::ports::EventSink) port. Adapters on the
//! other side decide what to do with them: log to serial, publish over
//! MQTT, redraw the display.

use super::state::Mode;
use crate::onewire::ds18b20::TemperatureReading;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The fan was driven and the result should be reported.
    Status(StatusReport),

    /// The sensor did not answer; the fan was left at `held_duty`.
    SensorFault { mode: Mode, held_duty: u8 },

    /// The mode changed (encoder switch or network command).
    ModeChanged { from: Mode, to: Mode },

    /// Threshold or ceiling changed through a Config message.
    SettingsChanged { temp_threshold: f32, max_speed: u8 },

    /// The control service has started (carries initial mode).
    Started(Mode),
}

/// One status report: what was measured and what the fan was told.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusReport {
    /// `Fault` when no fresh reading backs this report.
    pub temperature: TemperatureReading,
    pub speed: u8,
    pub mode: Mode,
}
