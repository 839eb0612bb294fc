//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing each application event as one
//! structured line to the logger (UART / USB-CDC on the device).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::onewire::ds18b20::TemperatureReading;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Status(s) => match s.temperature {
                TemperatureReading::Celsius(c) => {
                    info!("STATUS | T={:.1}\u{00b0}C | speed={}% | mode={}", c, s.speed, s.mode.as_str());
                }
                TemperatureReading::Fault => {
                    info!("STATUS | T=-- | speed={}% | mode={}", s.speed, s.mode.as_str());
                }
            },
            AppEvent::SensorFault { mode, held_duty } => {
                warn!("FAULT | sensor not responding | holding {}% | mode={}", held_duty, mode.as_str());
            }
            AppEvent::ModeChanged { from, to } => {
                info!("MODE | {} -> {}", from.as_str(), to.as_str());
            }
            AppEvent::SettingsChanged { temp_threshold, max_speed } => {
                info!("SETTINGS | threshold={:.1}\u{00b0}C | max_speed={}%", temp_threshold, max_speed);
            }
            AppEvent::Started(mode) => {
                info!("START | initial_mode={}", mode.as_str());
            }
        }
    }
}
