//! Temperature → fan speed policy for Auto mode.
//!
//! Three tiers:
//!
//! | temperature          | speed       |
//! |----------------------|-------------|
//! | ≤ 25 °C              | 0 (off)     |
//! | ≤ `threshold`        | 50          |
//! | above `threshold`    | `max_speed` |
//!
//! The idle tier is checked first, so a threshold at or below 25 °C makes
//! the middle tier unreachable and the fan jumps straight from off to
//! `max_speed`. The middle tier is not capped by `max_speed`.

/// At or below this the fan is off.
pub const IDLE_CUTOFF_C: f32 = 25.0;

/// Speed between the idle cut-off and the threshold.
pub const MID_TIER_SPEED: u8 = 50;

/// Target speed for `temperature_c`.
pub fn auto_speed(temperature_c: f32, threshold_c: f32, max_speed: u8) -> u8 {
    if temperature_c <= IDLE_CUTOFF_C {
        0
    } else if temperature_c <= threshold_c {
        MID_TIER_SPEED
    } else {
        max_speed
    }
}
