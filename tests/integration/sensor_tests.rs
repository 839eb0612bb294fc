//! Integration tests running the control service on the simulated 1-Wire
//! bus: the DS18B20 driver, the hardware adapter and the speed map together.

use crate::mock_hw::RecordingSink;

use thermofan::adapters::hardware::HardwareAdapter;
use thermofan::app::events::AppEvent;
use thermofan::app::ports::ActuatorPort;
use thermofan::app::service::{ControlService, CycleOutcome};
use thermofan::app::state::SharedState;
use thermofan::config::SystemConfig;
use thermofan::drivers::fan::FanDriver;
use thermofan::onewire::ds18b20::{Ds18b20, TemperatureReading, CONVERSION_TIME_MS};
use thermofan::onewire::sim::{SimDelay, SimDs18b20, SimLine};

fn rig(celsius: f32) -> (SimDs18b20, HardwareAdapter<SimLine, SimDelay>) {
    let sim = SimDs18b20::new(celsius);
    let hw = HardwareAdapter::new(Ds18b20::new(sim.line(), sim.delay()), FanDriver::new());
    (sim, hw)
}

#[test]
fn warm_room_runs_mid_tier() {
    let state = SharedState::default();
    let mut svc = ControlService::new(&state, SystemConfig::default());
    let (sim, mut hw) = rig(27.5);
    let mut sink = RecordingSink::new();

    let out = svc.tick(&mut hw, &mut sink);
    assert_eq!(out, CycleOutcome::Actuated { temperature: TemperatureReading::Celsius(27.5), duty: 50 });
    assert_eq!(hw.fan_duty(), 50);
    assert_eq!(sim.conversions(), 1);
    assert!(sim.elapsed_us() >= u64::from(CONVERSION_TIME_MS) * 1_000);
}

#[test]
fn heating_room_ramps_fan() {
    let state = SharedState::default();
    let mut svc = ControlService::new(&state, SystemConfig::default());
    let (sim, mut hw) = rig(21.0);
    let mut sink = RecordingSink::new();

    let mut duties = Vec::new();
    for celsius in [21.0, 26.0, 29.9375, 30.0625, 24.0] {
        sim.set_temperature(celsius);
        svc.tick(&mut hw, &mut sink);
        duties.push(hw.fan_duty());
    }
    assert_eq!(duties, vec![0, 50, 50, 100, 0]);
}

#[test]
fn unplugged_sensor_holds_fan_and_reports_fault() {
    let state = SharedState::default();
    let mut svc = ControlService::new(&state, SystemConfig::default());
    let (sim, mut hw) = rig(35.0);
    let mut sink = RecordingSink::new();

    svc.tick(&mut hw, &mut sink);
    assert_eq!(hw.fan_duty(), 100);

    sim.set_present(false);
    let out = svc.tick(&mut hw, &mut sink);
    assert_eq!(out, CycleOutcome::SensorFault { held_duty: 100 });
    assert_eq!(hw.fan_duty(), 100);
    assert!(svc.last_temperature().is_fault());
    assert!(matches!(sink.events.last(), Some(AppEvent::SensorFault { held_duty: 100, .. })));

    sim.set_present(true);
    sim.set_temperature(22.0);
    svc.tick(&mut hw, &mut sink);
    assert_eq!(hw.fan_duty(), 0);
}

#[test]
fn sensor_lost_mid_measurement_is_a_fault() {
    let state = SharedState::default();
    let mut svc = ControlService::new(&state, SystemConfig::default());
    let (sim, mut hw) = rig(35.0);
    let mut sink = RecordingSink::new();

    sim.vanish_after_conversion();
    let out = svc.tick(&mut hw, &mut sink);
    assert_eq!(out, CycleOutcome::SensorFault { held_duty: 0 });
    assert_eq!(sim.conversions(), 1);
}

// ── Driver on the bus ─────────────────────────────────────────

#[test]
fn measurement_addresses_the_single_device() {
    let sim = SimDs18b20::new(-10.125);
    let mut sensor = Ds18b20::new(sim.line(), sim.delay());
    assert_eq!(sensor.read_temperature(), TemperatureReading::Celsius(-10.125));
    assert_eq!(sim.received(), vec![0xCC, 0x44, 0xCC, 0xBE]);
}

#[test]
fn empty_bus_fails_fast_with_sentinel() {
    let sim = SimDs18b20::absent();
    let mut sensor = Ds18b20::new(sim.line(), sim.delay());
    let reading = sensor.read_temperature();
    assert!(reading.is_fault());
    assert_eq!(reading.celsius(), -127.0);
    assert_eq!(sim.conversions(), 0);
    // No conversion wait without a presence pulse.
    assert!(sim.elapsed_us() < u64::from(CONVERSION_TIME_MS) * 1_000);
}
