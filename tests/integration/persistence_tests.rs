//! Integration tests for settings persistence across a reboot.
//!
//! Config messages reach the service through the event queue, are written
//! back after the debounce and seed the runtime state on the next boot.

use crate::mock_hw::{MockHardware, MockNvs, RecordingSink};

use thermofan::adapters::mqtt::{self, TOPIC_COMMAND, TOPIC_CONFIG};
use thermofan::adapters::nvs::NvsAdapter;
use thermofan::adapters::wifi::{WifiCredentials, CREDENTIALS_NAMESPACE, PASSWORD_KEY, SSID_KEY};
use thermofan::app::events::AppEvent;
use thermofan::app::ports::{ConfigPort, StoragePort};
use thermofan::app::service::ControlService;
use thermofan::app::state::{Mode, SharedState, SystemState};
use thermofan::config::SystemConfig;
use thermofan::drivers::encoder::InputQueue;
use thermofan::events::{Event, EventQueue};

#[test]
fn config_message_survives_reboot() {
    let nvs = NvsAdapter::new().unwrap();
    let config = nvs.load().unwrap();
    let state = SharedState::new(SystemState::from_config(&config));
    let inputs = InputQueue::new();
    let events: EventQueue<8> = EventQueue::new();
    let mut svc = ControlService::new(&state, config);
    let mut hw = MockHardware::at(28.0);
    let mut sink = RecordingSink::new();

    mqtt::handle_inbound(TOPIC_CONFIG, br#"{"temp_threshold":27.5,"max_speed":80}"#, &state, &events)
        .unwrap();
    svc.poll(&inputs, &events, &mut hw, &mut sink);
    assert!(svc.is_settings_dirty());
    assert!(matches!(
        sink.events.last(),
        Some(AppEvent::SettingsChanged { max_speed: 80, .. })
    ));
    assert!(!svc.auto_save_if_needed(&nvs), "saved before the debounce elapsed");

    events.push(Event::ControlTick);
    svc.poll(&inputs, &events, &mut hw, &mut sink);
    // 28.0 is above the new threshold, so the new ceiling applies at once.
    assert_eq!(hw.duty(), 80);
    assert!(svc.auto_save_if_needed(&nvs));
    assert!(!svc.is_settings_dirty());

    // Reboot: same flash, fresh everything else.
    let reloaded = nvs.load().unwrap();
    assert_eq!(reloaded.temp_threshold_c, 27.5);
    assert_eq!(reloaded.max_speed_percent, 80);
    let boot = SystemState::from_config(&reloaded);
    assert_eq!(boot.mode(), Mode::Auto);
    assert_eq!(boot.manual_speed(), 0);
    assert_eq!(boot.temp_threshold(), 27.5);
    assert_eq!(boot.max_speed(), 80);
}

#[test]
fn commands_are_not_persisted() {
    let nvs = MockNvs::new();
    let state = SharedState::default();
    let inputs = InputQueue::new();
    let events: EventQueue<8> = EventQueue::new();
    let mut svc = ControlService::new(&state, SystemConfig::default());
    let mut hw = MockHardware::at(22.0);
    let mut sink = RecordingSink::new();

    mqtt::handle_inbound(TOPIC_COMMAND, br#"{"mode":"manual","speed":65}"#, &state, &events).unwrap();
    for _ in 0..3 {
        events.push(Event::ControlTick);
        svc.poll(&inputs, &events, &mut hw, &mut sink);
        svc.auto_save_if_needed(&nvs);
    }
    assert_eq!(hw.duty(), 65);
    assert!(nvs.saved.borrow().is_empty());
}

#[test]
fn burst_of_config_changes_saves_once_with_final_values() {
    let nvs = MockNvs::new();
    let state = SharedState::default();
    let inputs = InputQueue::new();
    let events: EventQueue<8> = EventQueue::new();
    let mut svc = ControlService::new(&state, SystemConfig::default());
    let mut hw = MockHardware::at(22.0);
    let mut sink = RecordingSink::new();

    for max in [90u8, 70, 60] {
        let payload = format!(r#"{{"max_speed":{}}}"#, max);
        mqtt::handle_inbound(TOPIC_CONFIG, payload.as_bytes(), &state, &events).unwrap();
        svc.poll(&inputs, &events, &mut hw, &mut sink);
        assert!(!svc.auto_save_if_needed(&nvs));
    }

    events.push(Event::ControlTick);
    svc.poll(&inputs, &events, &mut hw, &mut sink);
    assert!(svc.auto_save_if_needed(&nvs));
    assert!(!svc.auto_save_if_needed(&nvs));

    let saved = nvs.saved.borrow();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].max_speed_percent, 60);
}

#[test]
fn identical_config_does_not_dirty_settings() {
    let state = SharedState::default();
    let events: EventQueue<8> = EventQueue::new();
    let mut svc = ControlService::new(&state, SystemConfig::default());
    let mut sink = RecordingSink::new();

    mqtt::handle_inbound(TOPIC_CONFIG, br#"{"temp_threshold":30.0,"max_speed":100}"#, &state, &events)
        .unwrap();
    assert!(events.is_empty());
    svc.sync_settings(&mut sink);
    assert!(!svc.is_settings_dirty());
    assert!(sink.events.is_empty());
}

#[test]
fn credentials_and_config_share_storage_without_clashing() {
    let mut nvs = NvsAdapter::new().unwrap();
    let creds = WifiCredentials::new("Workshop", "solder-fumes-42").unwrap();
    creds.store(&mut nvs).unwrap();

    let mut config = SystemConfig::default();
    config.temp_threshold_c = -12.0;
    nvs.save(&config).unwrap();

    assert_eq!(WifiCredentials::load(&nvs), Some(creds));
    assert_eq!(nvs.load().unwrap().temp_threshold_c, -12.0);
}

#[test]
fn credentials_round_trip_through_any_storage() {
    let mut nvs = MockNvs::new();
    assert!(WifiCredentials::load(&nvs).is_none());
    let creds = WifiCredentials::new("open-cafe", "").unwrap();
    creds.store(&mut nvs).unwrap();
    let loaded = WifiCredentials::load(&nvs).unwrap();
    assert_eq!(loaded.ssid(), "open-cafe");
    assert_eq!(loaded.password(), "");
}

#[test]
fn provisioned_string_credentials_load() {
    let mut nvs = MockNvs::new();
    nvs.set_raw_str(CREDENTIALS_NAMESPACE, SSID_KEY, b"Workshop\0");
    nvs.set_raw_str(CREDENTIALS_NAMESPACE, PASSWORD_KEY, b"solder-fumes-42\0");

    let loaded = WifiCredentials::load(&nvs).unwrap();
    assert_eq!(loaded.ssid(), "Workshop");
    assert_eq!(loaded.password(), "solder-fumes-42");
}

#[test]
fn stored_credentials_are_nul_terminated_strings() {
    let mut nvs = MockNvs::new();
    WifiCredentials::new("Workshop", "solder-fumes-42").unwrap().store(&mut nvs).unwrap();

    assert_eq!(nvs.raw_str(CREDENTIALS_NAMESPACE, SSID_KEY), Some(&b"Workshop\0"[..]));
    assert_eq!(nvs.raw_str(CREDENTIALS_NAMESPACE, PASSWORD_KEY), Some(&b"solder-fumes-42\0"[..]));
    let mut buf = [0u8; 64];
    assert!(nvs.read(CREDENTIALS_NAMESPACE, SSID_KEY, &mut buf).is_err());
}

#[test]
fn blob_credentials_are_not_read_as_strings() {
    let mut nvs = MockNvs::new();
    nvs.write(CREDENTIALS_NAMESPACE, SSID_KEY, b"Workshop").unwrap();
    assert!(nvs.exists(CREDENTIALS_NAMESPACE, SSID_KEY));
    assert!(WifiCredentials::load(&nvs).is_none());
}
