//! Fuzz target: `parse_command` / `parse_config`
//!
//! Arbitrary bytes must never panic either parser, and anything they
//! accept must already be in range.
//!
//! cargo fuzz run fuzz_command_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use thermofan::app::state::{SPEED_MAX, THRESHOLD_MAX_C, THRESHOLD_MIN_C};
use thermofan::protocol::{parse_command, parse_config};

fuzz_target!(|data: &[u8]| {
    if let Ok(command) = parse_command(data) {
        if let Some(speed) = command.speed {
            assert!(speed <= SPEED_MAX, "command speed out of range");
        }
    }

    if let Ok(config) = parse_config(data) {
        if let Some(t) = config.temp_threshold {
            assert!((THRESHOLD_MIN_C..=THRESHOLD_MAX_C).contains(&t), "threshold not clamped");
        }
        if let Some(s) = config.max_speed {
            assert!(s <= SPEED_MAX, "max speed not clamped");
        }
    }
});
