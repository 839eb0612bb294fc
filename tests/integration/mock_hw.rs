//! Mock adapters for integration tests.
//!
//! Records every actuator call and every emitted event so tests can assert
//! on the full history without touching real GPIO/PWM registers.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use thermofan::adapters::mqtt::MqttPublisher;
use thermofan::app::events::AppEvent;
use thermofan::app::ports::{
    ActuatorPort, ConfigError, ConfigPort, EventSink, StorageError, StoragePort, TemperaturePort,
};
use thermofan::config::SystemConfig;
use thermofan::error::CommsError;
use thermofan::onewire::ds18b20::TemperatureReading;

// ── MockHardware ──────────────────────────────────────────────

/// Sensor with a script of readings (the last one repeats) and a fan that
/// records every duty it was given.
pub struct MockHardware {
    readings: VecDeque<TemperatureReading>,
    current: TemperatureReading,
    pub duty_history: Vec<u8>,
    pub reads: u32,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn at(celsius: f32) -> Self {
        Self {
            readings: VecDeque::new(),
            current: TemperatureReading::Celsius(celsius),
            duty_history: Vec::new(),
            reads: 0,
        }
    }

    pub fn script(readings: &[TemperatureReading]) -> Self {
        let mut hw = Self::at(0.0);
        hw.readings.extend(readings.iter().copied());
        hw
    }

    pub fn set_reading(&mut self, reading: TemperatureReading) {
        self.readings.clear();
        self.current = reading;
    }

    pub fn duty(&self) -> u8 {
        self.duty_history.last().copied().unwrap_or(0)
    }
}

impl TemperaturePort for MockHardware {
    fn read_temperature(&mut self) -> TemperatureReading {
        self.reads += 1;
        if let Some(next) = self.readings.pop_front() {
            self.current = next;
        }
        self.current
    }
}

impl ActuatorPort for MockHardware {
    fn set_fan_duty(&mut self, percent: u8) {
        self.duty_history.push(percent);
    }

    fn fan_duty(&self) -> u8 {
        self.duty()
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statuses(&self) -> Vec<(u8, thermofan::app::state::Mode)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::Status(s) => Some((s.speed, s.mode)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── RecordingPublisher ────────────────────────────────────────

#[derive(Default)]
pub struct RecordingPublisher {
    pub messages: Vec<(String, String)>,
}

#[allow(dead_code)]
impl RecordingPublisher {
    pub fn on(&self, topic: &str) -> Vec<serde_json::Value> {
        self.messages
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| serde_json::from_str(p).unwrap())
            .collect()
    }
}

impl MqttPublisher for RecordingPublisher {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        let text = String::from_utf8(payload.to_vec()).map_err(|_| CommsError::MqttPublishFailed)?;
        self.messages.push((topic.to_owned(), text));
        Ok(())
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    store: HashMap<String, Vec<u8>>,
    /// String entries, kept NUL-terminated as NVS stores them.
    strings: HashMap<String, Vec<u8>>,
    pub saved: RefCell<Vec<SystemConfig>>,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_saved(&self) -> Option<SystemConfig> {
        self.saved.borrow().last().cloned()
    }

    /// Provision a raw string entry, terminator included.
    pub fn set_raw_str(&mut self, namespace: &str, key: &str, raw: &[u8]) {
        self.strings.insert(format!("{}::{}", namespace, key), raw.to_vec());
    }

    pub fn raw_str(&self, namespace: &str, key: &str) -> Option<&[u8]> {
        self.strings.get(&format!("{}::{}", namespace, key)).map(Vec::as_slice)
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let key = format!("{}::{}", namespace, key);
        match self.store.get(&key) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None if self.strings.contains_key(&key) => Err(StorageError::TypeMismatch),
            None => Err(StorageError::NotFound),
        }
    }

    fn read_str(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let key = format!("{}::{}", namespace, key);
        match self.strings.get(&key) {
            Some(raw) => {
                let text = raw.split(|&b| b == 0).next().unwrap_or_default();
                let n = text.len().min(buf.len());
                buf[..n].copy_from_slice(&text[..n]);
                Ok(n)
            }
            None if self.store.contains_key(&key) => Err(StorageError::TypeMismatch),
            None => Err(StorageError::NotFound),
        }
    }

    fn write_str(&mut self, namespace: &str, key: &str, value: &str) -> Result<(), StorageError> {
        let mut raw = value.as_bytes().to_vec();
        raw.push(0);
        let key = format!("{}::{}", namespace, key);
        self.store.remove(&key);
        self.strings.insert(key, raw);
        Ok(())
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let key = format!("{}::{}", namespace, key);
        self.strings.remove(&key);
        self.store.insert(key, data.to_vec());
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        let key = format!("{}::{}", namespace, key);
        self.store.contains_key(&key) || self.strings.contains_key(&key)
    }
}

impl ConfigPort for MockNvs {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        Ok(self.last_saved().unwrap_or_default())
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        self.saved.borrow_mut().push(config.clone());
        Ok(())
    }
}
