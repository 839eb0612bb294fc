//! Integration tests for the input → shared state → control cycle pipeline.
//!
//! Drives [`ControlService::poll`] the way the control task does, with
//! private input and event queues instead of the ISR-fed globals.

use crate::mock_hw::{MockHardware, RecordingSink};

use thermofan::app::commands::Command;
use thermofan::app::events::AppEvent;
use thermofan::app::ports::{ActuatorPort, TemperaturePort};
use thermofan::app::service::{ControlService, CycleOutcome};
use thermofan::app::state::{Mode, SharedState};
use thermofan::config::SystemConfig;
use thermofan::drivers::encoder::{EncoderEvent, InputQueue, QuadratureDecoder};
use thermofan::events::{Event, EventQueue};
use thermofan::onewire::ds18b20::TemperatureReading;

struct Rig {
    state: SharedState,
    inputs: InputQueue,
    events: EventQueue<8>,
}

impl Rig {
    fn new() -> Self {
        Self { state: SharedState::default(), inputs: InputQueue::new(), events: EventQueue::new() }
    }
}

// ── Encoder path ──────────────────────────────────────────────

#[test]
fn button_then_knob_drives_fan_without_waiting_for_a_cycle() {
    let rig = Rig::new();
    let mut svc = ControlService::new(&rig.state, SystemConfig::default());
    let mut hw = MockHardware::at(22.0);
    let mut sink = RecordingSink::new();
    svc.start(&mut sink);
    svc.tick(&mut hw, &mut sink);
    assert_eq!(hw.reads, 1);

    rig.inputs.push(EncoderEvent::ButtonPress);
    for _ in 0..30 {
        rig.inputs.push(EncoderEvent::Increment);
    }
    assert!(svc.poll(&rig.inputs, &rig.events, &mut hw, &mut sink));

    assert_eq!(hw.duty(), 30);
    assert_eq!(hw.reads, 1, "manual refresh must not block on the sensor");
    assert!(sink.events.contains(&AppEvent::ModeChanged { from: Mode::Auto, to: Mode::Manual }));
    assert_eq!(sink.statuses().last(), Some(&(30, Mode::Manual)));
}

#[test]
fn knob_in_auto_moves_manual_speed_silently() {
    let rig = Rig::new();
    let mut svc = ControlService::new(&rig.state, SystemConfig::default());
    let mut hw = MockHardware::at(22.0);
    let mut sink = RecordingSink::new();

    for _ in 0..5 {
        rig.inputs.push(EncoderEvent::Increment);
    }
    assert!(svc.poll(&rig.inputs, &rig.events, &mut hw, &mut sink));
    assert_eq!(rig.state.snapshot().manual_speed(), 5);
    assert!(hw.duty_history.is_empty());
    assert!(sink.events.is_empty());
}

#[test]
fn decoder_output_feeds_state() {
    let rig = Rig::new();
    let decoder = QuadratureDecoder::new();
    rig.state.apply_command(&Command::mode(Mode::Manual));

    // Three detents clockwise (B high on A rising), one back.
    let edges = [
        (true, true), (false, false),
        (true, true), (false, false),
        (true, true), (false, true),
        (true, false),
    ];
    for (a, b) in edges {
        if let Some(e) = decoder.on_phase_a_edge(a, b) {
            rig.inputs.push(e);
        }
    }
    let mut svc = ControlService::new(&rig.state, SystemConfig::default());
    let mut hw = MockHardware::at(22.0);
    let mut sink = RecordingSink::new();
    svc.poll(&rig.inputs, &rig.events, &mut hw, &mut sink);
    assert_eq!(rig.state.snapshot().manual_speed(), 2);
}

#[test]
fn increments_saturate_at_full_speed() {
    let rig = Rig::new();
    let mut svc = ControlService::new(&rig.state, SystemConfig::default());
    let mut hw = MockHardware::at(22.0);
    let mut sink = RecordingSink::new();

    // More than the input queue holds; feed it in batches like the ISR would
    // between polls.
    for _ in 0..5 {
        for _ in 0..30 {
            rig.inputs.push(EncoderEvent::Increment);
        }
        svc.poll(&rig.inputs, &rig.events, &mut hw, &mut sink);
    }
    assert_eq!(rig.state.snapshot().manual_speed(), 100);
    assert_eq!(rig.inputs.dropped(), 0);
}

/// Sensor whose conversion wait lets the knob keep turning: every wait
/// slice the ISR queues `steps_per_slice` more increments.
struct SpinningKnobSensor<'q> {
    knob: &'q InputQueue,
    slices: u32,
    steps_per_slice: u32,
    duty: u8,
}

impl TemperaturePort for SpinningKnobSensor<'_> {
    fn read_temperature(&mut self) -> TemperatureReading {
        TemperatureReading::Celsius(22.0)
    }

    fn read_temperature_while(&mut self, idle: &mut dyn FnMut()) -> TemperatureReading {
        for _ in 0..self.slices {
            for _ in 0..self.steps_per_slice {
                self.knob.push(EncoderEvent::Increment);
            }
            idle();
        }
        self.read_temperature()
    }
}

impl ActuatorPort for SpinningKnobSensor<'_> {
    fn set_fan_duty(&mut self, percent: u8) {
        self.duty = percent;
    }

    fn fan_duty(&self) -> u8 {
        self.duty
    }
}

#[test]
fn knob_steps_during_conversion_are_not_lost() {
    let rig = Rig::new();
    rig.state.apply_command(&Command { mode: Some(Mode::Manual), speed: Some(0) });
    let mut svc = ControlService::new(&rig.state, SystemConfig::default());
    let mut sink = RecordingSink::new();
    // 30 slices x 3 steps: far more than the 32-slot queue holds.
    let mut hw = SpinningKnobSensor { knob: &rig.inputs, slices: 30, steps_per_slice: 3, duty: 0 };

    rig.events.push(Event::ControlTick);
    svc.poll(&rig.inputs, &rig.events, &mut hw, &mut sink);

    assert_eq!(rig.inputs.dropped(), 0);
    assert_eq!(rig.state.snapshot().manual_speed(), 90);
    // The cycle's snapshot follows the wait, so the fan already matches.
    assert_eq!(hw.duty, 90);
}

#[test]
fn knob_steps_during_auto_republish_are_not_lost() {
    let rig = Rig::new();
    let mut svc = ControlService::new(&rig.state, SystemConfig::default());
    let mut sink = RecordingSink::new();
    let mut hw = SpinningKnobSensor { knob: &rig.inputs, slices: 30, steps_per_slice: 2, duty: 0 };

    rig.events.push(Event::Republish);
    svc.poll(&rig.inputs, &rig.events, &mut hw, &mut sink);

    assert_eq!(rig.inputs.dropped(), 0);
    assert_eq!(rig.state.snapshot().manual_speed(), 60);
    assert_eq!(rig.state.snapshot().mode(), Mode::Auto);
    assert_eq!(hw.duty, 0);
}

// ── Auto cycle ────────────────────────────────────────────────

#[test]
fn auto_tiers_follow_temperature() {
    let rig = Rig::new();
    let mut svc = ControlService::new(&rig.state, SystemConfig::default());
    let mut hw = MockHardware::script(&[
        TemperatureReading::Celsius(20.0),
        TemperatureReading::Celsius(25.0),
        TemperatureReading::Celsius(27.0),
        TemperatureReading::Celsius(30.0),
        TemperatureReading::Celsius(30.5),
    ]);
    let mut sink = RecordingSink::new();

    for _ in 0..5 {
        rig.events.push(Event::ControlTick);
        svc.poll(&rig.inputs, &rig.events, &mut hw, &mut sink);
    }
    assert_eq!(hw.duty_history, vec![0, 0, 50, 50, 100]);
    assert_eq!(svc.cycle_count(), 5);
}

#[test]
fn tick_and_republish_coalesce_into_one_cycle() {
    let rig = Rig::new();
    let mut svc = ControlService::new(&rig.state, SystemConfig::default());
    let mut hw = MockHardware::at(28.0);
    let mut sink = RecordingSink::new();

    rig.events.push(Event::Republish);
    rig.events.push(Event::ControlTick);
    rig.events.push(Event::Republish);
    svc.poll(&rig.inputs, &rig.events, &mut hw, &mut sink);
    assert_eq!(hw.reads, 1);
    assert_eq!(sink.statuses(), vec![(50, Mode::Auto)]);
}

#[test]
fn auto_republish_takes_fresh_reading() {
    let rig = Rig::new();
    rig.state.apply_command(&Command::mode(Mode::Manual));
    let mut svc = ControlService::new(&rig.state, SystemConfig::default());
    let mut hw = MockHardware::at(40.0);
    let mut sink = RecordingSink::new();

    rig.state.apply_command(&Command::mode(Mode::Auto));
    rig.events.push(Event::Republish);
    svc.poll(&rig.inputs, &rig.events, &mut hw, &mut sink);
    assert_eq!(hw.reads, 1);
    assert_eq!(hw.duty(), 100);
}

#[test]
fn max_speed_caps_hot_tier() {
    let rig = Rig::new();
    rig.state.apply_config(&thermofan::app::commands::Config { temp_threshold: Some(26.0), max_speed: Some(70) });
    let mut svc = ControlService::new(&rig.state, SystemConfig::default());
    let mut hw = MockHardware::at(26.5);
    let mut sink = RecordingSink::new();
    svc.tick(&mut hw, &mut sink);
    assert_eq!(hw.duty(), 70);
}

// ── Sensor faults ─────────────────────────────────────────────

#[test]
fn fault_holds_then_recovers() {
    let rig = Rig::new();
    let mut svc = ControlService::new(&rig.state, SystemConfig::default());
    let mut hw = MockHardware::script(&[
        TemperatureReading::Celsius(35.0),
        TemperatureReading::Fault,
        TemperatureReading::Fault,
        TemperatureReading::Celsius(20.0),
    ]);
    let mut sink = RecordingSink::new();

    assert_eq!(svc.tick(&mut hw, &mut sink), CycleOutcome::Actuated { temperature: TemperatureReading::Celsius(35.0), duty: 100 });
    assert_eq!(svc.tick(&mut hw, &mut sink), CycleOutcome::SensorFault { held_duty: 100 });
    assert_eq!(svc.tick(&mut hw, &mut sink), CycleOutcome::SensorFault { held_duty: 100 });
    assert_eq!(hw.duty_history, vec![100], "fan must not be touched on a fault");

    svc.tick(&mut hw, &mut sink);
    assert_eq!(hw.duty(), 0);
    let faults = sink.events.iter().filter(|e| matches!(e, AppEvent::SensorFault { .. })).count();
    assert_eq!(faults, 2);
}

#[test]
fn manual_republish_after_fault_reports_fault() {
    let rig = Rig::new();
    let mut svc = ControlService::new(&rig.state, SystemConfig::default());
    let mut hw = MockHardware::at(0.0);
    hw.set_reading(TemperatureReading::Fault);
    let mut sink = RecordingSink::new();
    svc.tick(&mut hw, &mut sink);

    rig.state.apply_command(&Command { speed: Some(45), mode: Some(Mode::Manual) });
    svc.republish(&mut hw, &mut sink);
    assert_eq!(hw.duty(), 45);
    match sink.events.last() {
        Some(AppEvent::Status(s)) => assert!(s.temperature.is_fault()),
        other => panic!("expected a status, got {:?}", other),
    }
}

// ── Command semantics ─────────────────────────────────────────

#[test]
fn speed_sent_in_auto_is_not_remembered() {
    let rig = Rig::new();
    rig.state.apply_command(&Command::speed(70));
    rig.state.apply_encoder(EncoderEvent::ButtonPress);
    let s = rig.state.snapshot();
    assert_eq!(s.mode(), Mode::Manual);
    assert_eq!(s.manual_speed(), 0);
}
