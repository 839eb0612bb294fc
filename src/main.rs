//! Thermofan firmware entry point.
//!
//! Hexagonal architecture with a single control task.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter    LogEventSink   MqttStatusSink  DisplaySink │
//! │  (Temp+Actuator)    (EventSink)    (EventSink)     (EventSink) │
//! │  NvsAdapter         MQTT callback ──▶ SharedState (ControlPort)│
//! │  (Config+Storage)   Encoder ISRs  ──▶ InputQueue               │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            ControlService (pure logic)                 │    │
//! │  │  speed map · mode arbitration · settings debounce      │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use esp_idf_hal::delay::Delay;
use esp_idf_hal::gpio::{Gpio4, InputOutput, PinDriver, Pull};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{info, warn};

use thermofan::adapters::device_id::{self, DeviceIdString};
use thermofan::adapters::display::DisplaySink;
use thermofan::adapters::hardware::HardwareAdapter;
use thermofan::adapters::log_sink::LogEventSink;
use thermofan::adapters::mqtt::{self, EspPublisher, MqttStatusSink};
use thermofan::adapters::nvs::NvsAdapter;
use thermofan::adapters::wifi::{self, WifiCredentials};
use thermofan::app::ports::ConfigPort;
use thermofan::app::service::ControlService;
use thermofan::app::state::{SharedState, SystemState};
use thermofan::config::SystemConfig;
use thermofan::drivers::encoder::INPUT_EVENTS;
use thermofan::drivers::fan::FanDriver;
use thermofan::drivers::task_pin::{spawn_on_core, Core};
use thermofan::drivers::{hw_init, hw_timer};
use thermofan::events::EVENTS;
use thermofan::onewire::ds18b20::Ds18b20;
use thermofan::onewire::OpenDrainPin;

/// DS18B20 data line (`pins::ONEWIRE_GPIO`).
type SensorPin = PinDriver<'static, Gpio4, InputOutput>;
type Hardware = HardwareAdapter<OpenDrainPin<SensorPin>, Delay>;

const CONTROL_TASK_PRIORITY: u8 = 5;
const CONTROL_TASK_STACK_KB: usize = 8;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Thermofan v{}                    ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Peripherals ────────────────────────────────────────
    hw_init::init_peripherals()?;
    if let Err(e) = hw_init::init_isr_service() {
        warn!("ISR service init failed: {}, encoder disabled", e);
    }

    // ── 3. Load config from NVS (or defaults) ─────────────────
    let nvs = match NvsAdapter::new() {
        Ok(n) => Some(n),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            None
        }
    };
    let config = match nvs.as_ref().map(ConfigPort::load) {
        Some(Ok(cfg)) => cfg,
        Some(Err(e)) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
        None => SystemConfig::default(),
    };
    let state = Arc::new(SharedState::new(SystemState::from_config(&config)));

    // ── 4. Device identity ────────────────────────────────────
    let mac = device_id::read_mac();
    let dev_id = device_id::device_id(&mac);
    info!("Device ID: {} (hostname: {})", dev_id, device_id::hostname(&mac));

    // ── 5. Sensor + fan ───────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let mut line = PinDriver::input_output_od(peripherals.pins.gpio4)?;
    line.set_pull(Pull::Up)?;
    let sensor = Ds18b20::new(OpenDrainPin::new(line), Delay::new_default());
    let hw = HardwareAdapter::new(sensor, FanDriver::new());

    // ── 6. Network (optional) ─────────────────────────────────
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take().ok();
    let wifi = match nvs.as_ref().and_then(|n| WifiCredentials::load(n)) {
        Some(creds) => wifi::connect(peripherals.modem, sysloop, nvs_partition, &creds)
            .map_err(|e| warn!("{}, running offline", e))
            .ok(),
        None => None,
    };
    let publisher = match wifi {
        Some(_) => mqtt::connect(&config, &dev_id, Arc::clone(&state))
            .map_err(|e| warn!("{}, running offline", e))
            .ok(),
        None => None,
    };

    // ── 7. Control task ───────────────────────────────────────
    let handle = spawn_on_core(
        Core::App,
        CONTROL_TASK_PRIORITY,
        CONTROL_TASK_STACK_KB,
        "control\0",
        move || control_task(config, state, hw, publisher, nvs, dev_id),
    )?;

    info!("System ready.");
    // Keeps the WiFi driver alive for the life of the firmware.
    let _wifi = wifi;
    if handle.join().is_err() {
        warn!("control task panicked");
    }
    Ok(())
}

// ── Control task ──────────────────────────────────────────────

fn control_task(
    config: SystemConfig,
    state: Arc<SharedState>,
    mut hw: Hardware,
    publisher: Option<EspPublisher>,
    nvs: Option<NvsAdapter>,
    dev_id: DeviceIdString,
) {
    let mut log_sink = LogEventSink::new();
    let mut display = DisplaySink::new();
    let mut mqtt = publisher.map(MqttStatusSink::new);
    let mut service = ControlService::new(&*state, config.clone());

    {
        let mut sinks = (&mut log_sink, (&mut display, mqtt.as_mut()));
        service.start(&mut sinks);
        service.tick(&mut hw, &mut sinks);
    }
    hw_timer::start_control_timer(config.control_period_ms);

    let poll_interval = Duration::from_millis(u64::from(config.event_poll_interval_ms));
    let mut inputs_dropped = 0;
    let mut events_dropped = 0;

    loop {
        if let Some(sink) = mqtt.as_mut() {
            if sink.publisher_mut().subscribe_if_needed() {
                if let Err(e) = sink.publish_device_info(&dev_id, env!("CARGO_PKG_VERSION")) {
                    warn!("MQTT: device info not sent: {}", e);
                }
            }
            sink.flush_pending();
        }

        let mut sinks = (&mut log_sink, (&mut display, mqtt.as_mut()));
        service.poll(&INPUT_EVENTS, &EVENTS, &mut hw, &mut sinks);

        if let Some(nvs) = nvs.as_ref() {
            service.auto_save_if_needed(nvs);
        }

        let dropped = INPUT_EVENTS.dropped();
        if dropped != inputs_dropped {
            warn!("encoder queue overflow: {} events dropped so far", dropped);
            inputs_dropped = dropped;
        }
        let dropped = EVENTS.dropped();
        if dropped != events_dropped {
            warn!("event queue overflow: {} events dropped so far", dropped);
            events_dropped = dropped;
        }

        std::thread::sleep(poll_interval);
    }
}
