//! Status display text.
//!
//! Produces the two lines shown on the 128x32 OLED:
//!
//! ```text
//! T: 23.1C  AUTO
//! SPD: 50% [#####-----]
//! ```
//!
//! Panel I/O is out of scope here; [`DisplaySink`] keeps the latest frame
//! and logs it, and a panel driver can take it from [`DisplaySink::lines`].

use core::fmt::Write;

use log::debug;

use crate::app::events::{AppEvent, StatusReport};
use crate::app::ports::EventSink;
use crate::app::state::{Mode, SPEED_MAX};
use crate::onewire::ds18b20::TemperatureReading;

pub type Line = heapless::String<32>;

const BAR_CELLS: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusLines {
    pub top: Line,
    pub bottom: Line,
}

pub fn render(report: &StatusReport) -> StatusLines {
    let mut lines = StatusLines::default();
    let mode = match report.mode {
        Mode::Auto => "AUTO",
        Mode::Manual => "MANUAL",
    };
    // Both lines fit in 32 bytes for every input; overflow only truncates.
    let _ = match report.temperature {
        TemperatureReading::Celsius(c) => write!(lines.top, "T:{:5.1}C  {}", c, mode),
        TemperatureReading::Fault => write!(lines.top, "T: --.-C  {}", mode),
    };

    let speed = report.speed.min(SPEED_MAX);
    let _ = write!(lines.bottom, "SPD:{:3}% [", speed);
    let filled = speed / BAR_CELLS;
    for cell in 0..BAR_CELLS {
        let _ = lines.bottom.push(if cell < filled { '#' } else { '-' });
    }
    let _ = lines.bottom.push(']');
    lines
}

/// [`EventSink`] that re-renders on every status or fault.
#[derive(Default)]
pub struct DisplaySink {
    lines: StatusLines,
    frames: u32,
}

impl DisplaySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &StatusLines {
        &self.lines
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    fn show(&mut self, report: &StatusReport) {
        self.lines = render(report);
        self.frames = self.frames.wrapping_add(1);
        debug!("OLED | {} | {}", self.lines.top, self.lines.bottom);
    }
}

impl EventSink for DisplaySink {
    fn emit(&mut self, event: &AppEvent) {
        match *event {
            AppEvent::Status(report) => self.show(&report),
            AppEvent::SensorFault { mode, held_duty } => self.show(&StatusReport {
                temperature: TemperatureReading::Fault,
                speed: held_duty,
                mode,
            }),
            _ => {}
        }
    }
}
