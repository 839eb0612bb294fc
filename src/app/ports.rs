//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlService (domain)
//! ```
//!
//! Driven adapters (sensor, fan, event sinks, storage) implement these
//! traits. The [`ControlService`](super::service::ControlService) consumes
//! them via generics, so the control cycle never touches hardware directly.
//! [`ControlPort`] points the other way: it is how input sources (encoder,
//! network) reach the shared state.

use super::commands::{Command, Config};
use super::events::AppEvent;
use super::state::{SystemState, Transition};
use crate::config::SystemConfig;
use crate::drivers::encoder::EncoderEvent;
use crate::onewire::ds18b20::TemperatureReading;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: one blocking temperature measurement.
pub trait TemperaturePort {
    fn read_temperature(&mut self) -> TemperatureReading;

    /// Like [`read_temperature`](Self::read_temperature), but calls `idle`
    /// repeatedly while waiting on the sensor. Sensors that answer at once
    /// need not override this.
    fn read_temperature_while(&mut self, idle: &mut dyn FnMut()) -> TemperatureReading {
        let reading = self.read_temperature();
        idle();
        reading
    }
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the fan.
pub trait ActuatorPort {
    /// Drive the fan at `percent` (0–100).
    fn set_fan_duty(&mut self, percent: u8);

    /// Last commanded duty.
    fn fan_duty(&self) -> u8;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`]s through this port. Adapters
/// decide where they go (serial log, MQTT, display).
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: &AppEvent) {
        (**self).emit(event);
    }
}

/// An absent sink (e.g. no network) swallows events.
impl<S: EventSink> EventSink for Option<S> {
    fn emit(&mut self, event: &AppEvent) {
        if let Some(sink) = self {
            sink.emit(event);
        }
    }
}

/// Fan-out to two sinks; nest for more.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &AppEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

// ───────────────────────────────────────────────────────────────
// Control port (driving adapters: encoder / network → domain)
// ───────────────────────────────────────────────────────────────

/// Every change to the runtime state goes through here. Implementations
/// apply each call atomically with respect to all other callers.
pub trait ControlPort {
    fn snapshot(&self) -> SystemState;
    fn on_encoder(&self, event: EncoderEvent) -> Transition;
    fn on_command(&self, command: &Command) -> Transition;
    fn on_config(&self, config: &Config) -> Transition;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations validate before persisting and reject out-of-range
/// values with [`ConfigError::ValidationFailed`].
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Namespaced key-value storage (network credentials and the like).
pub trait StoragePort {
    /// Read a value. Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;

    /// Read a string entry into `buf`, without its terminator. Returns the
    /// number of bytes written. Strings and blobs are distinct entry types:
    /// reading one as the other fails.
    fn read_str(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write `value` as a NUL-terminated string entry.
    fn write_str(&mut self, namespace: &str, key: &str, value: &str) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    /// The key holds a different entry type (string vs blob).
    TypeMismatch,
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::TypeMismatch => write!(f, "entry type mismatch"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Corrupted => Self::Config("stored config corrupted"),
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::IoError => Self::Config("storage I/O error"),
        }
    }
}
