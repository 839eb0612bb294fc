//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters. All tests run on the host with no real hardware.

mod control_tests;
mod mock_hw;
mod mqtt_tests;
mod persistence_tests;
mod sensor_tests;
