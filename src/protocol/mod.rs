//! JSON wire format for the MQTT topics.
//!
//! Pure parse/format functions; no state, no I/O.
//!
//! Inbound parsing is lenient about content and strict about structure.
//! Any subset of the known fields may be present, unknown fields are
//! ignored, and a known field with the wrong type or an unknown value is
//! skipped as if absent. Only a payload that is not a JSON object at all is
//! rejected, and then nothing is applied.

use core::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::app::commands::{Command, Config};
use crate::app::state::{Mode, SPEED_MAX, THRESHOLD_MAX_C, THRESHOLD_MIN_C};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Not valid JSON (or not UTF-8).
    Malformed,
    /// Valid JSON, but the top level is not an object.
    NotAnObject,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed JSON"),
            Self::NotAnObject => write!(f, "expected a JSON object"),
        }
    }
}

// ── Inbound ───────────────────────────────────────────────────

/// `{ "speed"?: 0-100, "mode"?: "auto" | "manual" }`
///
/// A fractional speed is truncated. A speed outside 0–100 is dropped.
pub fn parse_command(bytes: &[u8]) -> Result<Command, ParseError> {
    let obj = parse_object(bytes)?;
    let speed = obj
        .get("speed")
        .and_then(integer_value)
        // Range check runs on the truncated value: 100.7 is kept as 100 and
        // -0.5 as 0, matching the integer view of the field.
        .and_then(|s| u8::try_from(s).ok())
        .filter(|s| *s <= SPEED_MAX);
    let mode = obj.get("mode").and_then(Value::as_str).and_then(Mode::from_wire);
    Ok(Command { speed, mode })
}

/// `{ "temp_threshold"?: number, "max_speed"?: 0-100 }`
///
/// Out-of-range values are clamped into range.
pub fn parse_config(bytes: &[u8]) -> Result<Config, ParseError> {
    let obj = parse_object(bytes)?;
    let temp_threshold = obj
        .get("temp_threshold")
        .and_then(Value::as_f64)
        .map(|t| t.clamp(f64::from(THRESHOLD_MIN_C), f64::from(THRESHOLD_MAX_C)) as f32);
    let max_speed = obj
        .get("max_speed")
        .and_then(integer_value)
        .map(|s| s.clamp(0, i64::from(SPEED_MAX)) as u8);
    Ok(Config { temp_threshold, max_speed })
}

fn parse_object(bytes: &[u8]) -> Result<Map<String, Value>, ParseError> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ParseError::NotAnObject),
        Err(_) => Err(ParseError::Malformed),
    }
}

/// Any JSON number as an integer, truncating toward zero.
fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    }
}

// ── Outbound ──────────────────────────────────────────────────

#[derive(Serialize)]
struct StatusMessage {
    temp: f64,
    speed: u8,
    mode: Mode,
}

#[derive(Serialize)]
struct DeviceInfoMessage<'a> {
    device_id: &'a str,
    firmware: &'a str,
}

/// `{ "temp": 23.1, "speed": 50, "mode": "auto" }`, temperature rounded to
/// one decimal.
pub fn format_status(temperature_c: f32, speed: u8, mode: Mode) -> Vec<u8> {
    to_json(&StatusMessage { temp: round_tenths(temperature_c), speed, mode })
}

/// `{ "device_id": "FC-A1B2C3", "firmware": "0.1.0" }`
pub fn format_device_info(device_id: &str, firmware: &str) -> Vec<u8> {
    to_json(&DeviceInfoMessage { device_id, firmware })
}

fn round_tenths(celsius: f32) -> f64 {
    (f64::from(celsius) * 10.0).round() / 10.0
}

fn to_json(message: &impl Serialize) -> Vec<u8> {
    // Plain structs of scalars and strings always serialize.
    serde_json::to_vec(message).unwrap_or_default()
}
