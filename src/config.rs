//! System configuration parameters
//!
//! All tunable parameters for the fan controller. The runtime settings
//! (`temp_threshold_c`, `max_speed_percent`) are overwritten from NVS at boot
//! and written back whenever a network Config message changes them.

use serde::{Deserialize, Serialize};

use crate::app::state::{SPEED_MAX, THRESHOLD_MAX_C, THRESHOLD_MIN_C};

/// Broker used when nothing has been provisioned.
pub const DEFAULT_BROKER_URI: &str = "mqtt://broker.local:1883";

pub type BrokerUri = heapless::String<64>;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Control loop ---
    /// Period of the measure/decide/actuate/publish cycle (milliseconds)
    pub control_period_ms: u32,
    /// Sleep between event-queue polls in the control task (milliseconds)
    pub event_poll_interval_ms: u32,
    /// Quiet time after a settings change before it is written to flash
    pub settings_save_debounce_ms: u32,

    // --- Runtime settings ---
    /// Above this temperature Auto mode runs the fan at `max_speed_percent`
    pub temp_threshold_c: f32,
    /// Ceiling applied by Auto mode (0-100%)
    pub max_speed_percent: u8,

    // --- MQTT ---
    pub mqtt_broker_uri: BrokerUri,
    pub mqtt_keepalive_secs: u16,
    pub mqtt_reconnect_timeout_ms: u32,
    pub mqtt_network_timeout_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        let mut broker = BrokerUri::new();
        // Fits: the default URI is shorter than the capacity.
        let _ = broker.push_str(DEFAULT_BROKER_URI);

        Self {
            control_period_ms: 5_000,
            event_poll_interval_ms: 20,
            settings_save_debounce_ms: 5_000,

            temp_threshold_c: 30.0,
            max_speed_percent: 100,

            mqtt_broker_uri: broker,
            mqtt_keepalive_secs: 60,
            mqtt_reconnect_timeout_ms: 5_000,
            mqtt_network_timeout_ms: 10_000,
        }
    }
}

impl SystemConfig {
    /// Range-check every field. Persisted configs must pass before use.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(THRESHOLD_MIN_C..=THRESHOLD_MAX_C).contains(&self.temp_threshold_c) {
            return Err("temp_threshold_c must be -55.0–125.0");
        }
        if self.max_speed_percent > SPEED_MAX {
            return Err("max_speed_percent must be 0–100");
        }
        if !(500..=60_000).contains(&self.control_period_ms) {
            return Err("control_period_ms must be 500–60000");
        }
        if !(1..=1_000).contains(&self.event_poll_interval_ms) {
            return Err("event_poll_interval_ms must be 1–1000");
        }
        if self.mqtt_broker_uri.is_empty() {
            return Err("mqtt_broker_uri must not be empty");
        }
        Ok(())
    }
}
