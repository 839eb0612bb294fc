//! GPIO / peripheral pin assignments for the fan controller board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Temperature sensor (DS18B20, 1-Wire)
// ---------------------------------------------------------------------------

/// Open-drain data line with an external 4.7 kΩ pull-up.
pub const ONEWIRE_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// Rotary encoder
// ---------------------------------------------------------------------------

/// Phase A. Interrupts on any edge; only rising edges produce a step.
pub const ENCODER_A_GPIO: i32 = 15;
/// Phase B. Sampled from the phase A handler, no interrupt of its own.
pub const ENCODER_B_GPIO: i32 = 2;
/// Push switch, active LOW with internal pull-up.
pub const ENCODER_BUTTON_GPIO: i32 = 0;

// ---------------------------------------------------------------------------
// Fan
// ---------------------------------------------------------------------------

/// LEDC PWM output to the fan's control input.
pub const FAN_PWM_GPIO: i32 = 18;
/// 25 kHz keeps 4-pin PC fans inside their specified PWM band.
pub const FAN_PWM_FREQ_HZ: u32 = 25_000;
