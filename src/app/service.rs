//! Control service: the hexagonal core.
//!
//! [`ControlService`] runs the measure → decide → actuate → publish cycle
//! and is the only writer of the fan. It reads the shared state through
//! [`ControlPort`] snapshots and never holds the state lock across the
//! 750 ms sensor read, so network commands are never blocked by it.
//!
//! ```text
//!  TemperaturePort ──▶ ┌────────────────────────┐ ──▶ EventSink
//!                      │     ControlService      │
//!  ActuatorPort   ◀──  │  speed map · mode arb.  │ ◀── ControlPort
//!                      └────────────────────────┘
//! ```

use log::{debug, info, warn};

use crate::config::SystemConfig;
use crate::control::speed_map::auto_speed;
use crate::drivers::encoder::{EncoderEvent, InputQueue};
use crate::events::{Event, EventQueue};
use crate::onewire::ds18b20::TemperatureReading;

use super::events::{AppEvent, StatusReport};
use super::ports::{ActuatorPort, ConfigPort, ControlPort, EventSink, TemperaturePort};
use super::state::Mode;

/// What one cycle (or re-publish) did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// The fan was driven to `duty` and a status was emitted.
    Actuated { temperature: TemperatureReading, duty: u8 },
    /// The sensor failed; the fan was left at `held_duty`.
    SensorFault { held_duty: u8 },
}

// ───────────────────────────────────────────────────────────────
// ControlService
// ───────────────────────────────────────────────────────────────

pub struct ControlService<'a, C: ControlPort> {
    state: &'a C,
    config: SystemConfig,
    last_mode: Mode,
    /// Reading from the most recent cycle; re-publishes in Manual mode
    /// report it instead of blocking on a fresh conversion.
    last_temperature: TemperatureReading,
    cycle_count: u64,
    settings_dirty: bool,
    dirty_since_cycle: u64,
}

impl<'a, C: ControlPort> ControlService<'a, C> {
    pub fn new(state: &'a C, config: SystemConfig) -> Self {
        let last_mode = state.snapshot().mode();
        Self {
            state,
            config,
            last_mode,
            last_temperature: TemperatureReading::Fault,
            cycle_count: 0,
            settings_dirty: false,
            dirty_since_cycle: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        let mode = self.state.snapshot().mode();
        self.last_mode = mode;
        info!("ControlService: started in {:?} mode", mode);
        sink.emit(&AppEvent::Started(mode));
    }

    /// Drain pending input and task events, then run at most one cycle.
    ///
    /// A control tick wins over any number of queued re-publish requests:
    /// both end in a full refresh, so one is enough. Encoder steps that
    /// arrive during the sensor's conversion wait are applied between wait
    /// slices, so the input queue never fills behind a blocking read.
    /// Returns `true` if anything happened.
    pub fn poll<const N: usize>(
        &mut self,
        inputs: &InputQueue,
        events: &EventQueue<N>,
        hw: &mut (impl TemperaturePort + ActuatorPort),
        sink: &mut impl EventSink,
    ) -> bool {
        let mut republish = false;
        let mut had_input = false;
        while let Some(input) = inputs.pop() {
            had_input = true;
            republish |= self.handle_input(input);
        }

        let mut tick = false;
        let mut settings = false;
        events.drain(|event| match event {
            Event::ControlTick => tick = true,
            Event::Republish => republish = true,
            Event::SettingsChanged => settings = true,
        });

        if settings {
            self.sync_settings(sink);
        }
        if tick {
            self.cycle_count += 1;
            self.run_cycle(hw, sink, Some(inputs));
        } else if republish {
            self.refresh(hw, sink, Some(inputs));
        }
        had_input || tick || republish || settings
    }

    /// Apply one encoder event. Returns `true` if the fan and status need
    /// refreshing now.
    pub fn handle_input(&mut self, event: EncoderEvent) -> bool {
        let t = self.state.on_encoder(event);
        debug!(
            "INPUT | {:?} | manual_speed={} mode={:?}",
            event,
            t.after.manual_speed(),
            t.after.mode()
        );
        t.requires_republish()
    }

    /// The periodic cycle.
    pub fn tick(
        &mut self,
        hw: &mut (impl TemperaturePort + ActuatorPort),
        sink: &mut impl EventSink,
    ) -> CycleOutcome {
        self.cycle_count += 1;
        self.run_cycle(hw, sink, None)
    }

    /// Immediate refresh after a mode or manual speed change.
    ///
    /// Manual mode only needs the knob position, so it reuses the last
    /// reading. Auto mode needs a fresh temperature to choose a tier.
    pub fn republish(
        &mut self,
        hw: &mut (impl TemperaturePort + ActuatorPort),
        sink: &mut impl EventSink,
    ) -> CycleOutcome {
        self.refresh(hw, sink, None)
    }

    fn refresh(
        &mut self,
        hw: &mut (impl TemperaturePort + ActuatorPort),
        sink: &mut impl EventSink,
        inputs: Option<&InputQueue>,
    ) -> CycleOutcome {
        let snapshot = self.state.snapshot();
        match snapshot.mode() {
            Mode::Auto => self.run_cycle(hw, sink, inputs),
            Mode::Manual => {
                self.note_mode(Mode::Manual, sink);
                let duty = snapshot.manual_speed();
                hw.set_fan_duty(duty);
                sink.emit(&AppEvent::Status(StatusReport {
                    temperature: self.last_temperature,
                    speed: duty,
                    mode: Mode::Manual,
                }));
                CycleOutcome::Actuated { temperature: self.last_temperature, duty }
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn last_temperature(&self) -> TemperatureReading {
        self.last_temperature
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    // ── Internal ──────────────────────────────────────────────

    fn run_cycle(
        &mut self,
        hw: &mut (impl TemperaturePort + ActuatorPort),
        sink: &mut impl EventSink,
        inputs: Option<&InputQueue>,
    ) -> CycleOutcome {
        // Blocks ~750 ms. The snapshot is taken afterwards so a command or
        // knob step that arrived during the conversion is honoured this cycle.
        let state = self.state;
        let reading = match inputs {
            Some(inputs) => hw.read_temperature_while(&mut || drain_inputs(state, inputs)),
            None => hw.read_temperature(),
        };
        let snapshot = self.state.snapshot();
        let mode = snapshot.mode();
        self.note_mode(mode, sink);
        self.last_temperature = reading;

        let Some(celsius) = reading.ok() else {
            let held_duty = hw.fan_duty();
            warn!("ControlService: sensor fault, fan held at {}%", held_duty);
            sink.emit(&AppEvent::SensorFault { mode, held_duty });
            return CycleOutcome::SensorFault { held_duty };
        };

        let duty = match mode {
            Mode::Auto => auto_speed(celsius, snapshot.temp_threshold(), snapshot.max_speed()),
            Mode::Manual => snapshot.manual_speed(),
        };
        hw.set_fan_duty(duty);
        sink.emit(&AppEvent::Status(StatusReport { temperature: reading, speed: duty, mode }));
        CycleOutcome::Actuated { temperature: reading, duty }
    }

    fn note_mode(&mut self, mode: Mode, sink: &mut impl EventSink) {
        if mode != self.last_mode {
            sink.emit(&AppEvent::ModeChanged { from: self.last_mode, to: mode });
            self.last_mode = mode;
        }
    }

    // ── Settings persistence ──────────────────────────────────

    /// Pull threshold and ceiling from the shared state into the config
    /// that gets persisted. Restarts the save debounce if they changed.
    pub fn sync_settings(&mut self, sink: &mut impl EventSink) {
        let snapshot = self.state.snapshot();
        let temp_threshold = snapshot.temp_threshold();
        let max_speed = snapshot.max_speed();
        if temp_threshold == self.config.temp_threshold_c
            && max_speed == self.config.max_speed_percent
        {
            return;
        }
        self.config.temp_threshold_c = temp_threshold;
        self.config.max_speed_percent = max_speed;
        self.settings_dirty = true;
        self.dirty_since_cycle = self.cycle_count;
        sink.emit(&AppEvent::SettingsChanged { temp_threshold, max_speed });
    }

    /// Persist settings once they have been stable for the debounce period.
    /// Returns `true` if the config was saved.
    pub fn auto_save_if_needed(&mut self, storage: &impl ConfigPort) -> bool {
        if !self.settings_dirty {
            return false;
        }
        let cycles = self.cycle_count.saturating_sub(self.dirty_since_cycle);
        let elapsed_ms = cycles * u64::from(self.config.control_period_ms);
        if elapsed_ms < u64::from(self.config.settings_save_debounce_ms) {
            return false;
        }
        match storage.save(&self.config) {
            Ok(()) => {
                self.settings_dirty = false;
                info!("ControlService: settings saved");
                true
            }
            Err(e) => {
                warn!("ControlService: settings save failed: {}", e);
                false
            }
        }
    }

    pub fn is_settings_dirty(&self) -> bool {
        self.settings_dirty
    }
}

/// Apply every queued encoder step to the shared state.
fn drain_inputs<C: ControlPort>(state: &C, inputs: &InputQueue) {
    while let Some(event) = inputs.pop() {
        let t = state.on_encoder(event);
        debug!("INPUT | {:?} | manual_speed={} (during conversion)", event, t.after.manual_speed());
    }
}
