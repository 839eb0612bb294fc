//! Integration tests for the MQTT surface: inbound dispatch through the
//! shared state, the control task's refresh, and the published status.

use crate::mock_hw::{MockHardware, RecordingPublisher};

use thermofan::adapters::mqtt::{
    handle_inbound, InboundOutcome, MqttStatusSink, TOPIC_COMMAND, TOPIC_CONFIG, TOPIC_INFO, TOPIC_STATUS,
};
use thermofan::app::service::ControlService;
use thermofan::app::state::{Mode, SharedState};
use thermofan::config::SystemConfig;
use thermofan::drivers::encoder::InputQueue;
use thermofan::error::Error;
use thermofan::events::EventQueue;
use thermofan::onewire::ds18b20::TemperatureReading;

#[test]
fn manual_command_published_on_next_poll() {
    let state = SharedState::default();
    let inputs = InputQueue::new();
    let events: EventQueue<8> = EventQueue::new();
    let mut svc = ControlService::new(&state, SystemConfig::default());
    let mut hw = MockHardware::at(23.14);
    let mut mqtt = MqttStatusSink::new(RecordingPublisher::default());

    svc.tick(&mut hw, &mut mqtt);

    let out = handle_inbound(TOPIC_COMMAND, br#"{"mode":"manual","speed":65}"#, &state, &events).unwrap();
    assert_eq!(out, InboundOutcome::Command { republish: true });
    svc.poll(&inputs, &events, &mut hw, &mut mqtt);

    let statuses = mqtt.publisher().on(TOPIC_STATUS);
    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[1]["speed"], 65);
    assert_eq!(statuses[1]["mode"], "manual");
    assert_eq!(statuses[1]["temp"], 23.1);
    assert_eq!(hw.duty(), 65);
}

#[test]
fn published_status_replays_as_command() {
    let state = SharedState::default();
    let events: EventQueue<8> = EventQueue::new();
    let mut svc = ControlService::new(&state, SystemConfig::default());
    let mut hw = MockHardware::at(22.5);
    let mut mqtt = MqttStatusSink::new(RecordingPublisher::default());

    handle_inbound(TOPIC_COMMAND, br#"{"mode":"manual","speed":50}"#, &state, &events).unwrap();
    svc.tick(&mut hw, &mut mqtt);
    let (_, payload) = mqtt.publisher().messages.last().cloned().unwrap();

    let other = SharedState::default();
    handle_inbound(TOPIC_COMMAND, payload.as_bytes(), &other, &events).unwrap();
    assert_eq!(other.snapshot().mode(), Mode::Manual);
    assert_eq!(other.snapshot().manual_speed(), 50);
}

#[test]
fn sensor_fault_published_with_sentinel() {
    let state = SharedState::default();
    let mut svc = ControlService::new(&state, SystemConfig::default());
    let mut hw = MockHardware::at(0.0);
    hw.set_reading(TemperatureReading::Fault);
    let mut mqtt = MqttStatusSink::new(RecordingPublisher::default());

    svc.tick(&mut hw, &mut mqtt);
    let statuses = mqtt.publisher().on(TOPIC_STATUS);
    assert_eq!(statuses[0]["temp"], -127.0);
}

#[test]
fn garbage_never_touches_state() {
    let state = SharedState::default();
    let events: EventQueue<8> = EventQueue::new();
    let before = state.snapshot();

    let payloads: [&[u8]; 6] = [b"not json", b"", b"[]", b"null", b"{\"speed\":", &[0xC0, 0xFF]];
    for payload in payloads {
        let r = handle_inbound(TOPIC_COMMAND, payload, &state, &events);
        assert!(matches!(r, Err(Error::Protocol(_))), "payload {:?}", payload);
        let r = handle_inbound(TOPIC_CONFIG, payload, &state, &events);
        assert!(matches!(r, Err(Error::Protocol(_))));
    }
    assert_eq!(state.snapshot(), before);
    assert!(events.is_empty());
}

#[test]
fn config_clamps_and_queues_save() {
    let state = SharedState::default();
    let events: EventQueue<8> = EventQueue::new();
    handle_inbound(TOPIC_CONFIG, br#"{"temp_threshold": 500, "max_speed": 250}"#, &state, &events).unwrap();
    let s = state.snapshot();
    assert_eq!(s.temp_threshold(), 125.0);
    assert_eq!(s.max_speed(), 100);

    assert_eq!(events.len(), 1);

    // Unchanged values do not queue another save.
    let out = handle_inbound(TOPIC_CONFIG, br#"{"max_speed": 100}"#, &state, &events).unwrap();
    assert_eq!(out, InboundOutcome::Config { changed: false });
    assert_eq!(events.len(), 1);
}

#[test]
fn device_info_announced() {
    let mut mqtt = MqttStatusSink::new(RecordingPublisher::default());
    mqtt.publish_device_info("FC-EFCAFE", env!("CARGO_PKG_VERSION")).unwrap();
    let info = mqtt.publisher().on(TOPIC_INFO);
    assert_eq!(info[0]["device_id"], "FC-EFCAFE");
    assert_eq!(info[0]["firmware"], env!("CARGO_PKG_VERSION"));
}
