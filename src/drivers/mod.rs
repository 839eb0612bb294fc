//! Actuator and input drivers, hardware initialisation, and peripheral helpers.

pub mod encoder;
pub mod fan;
pub mod hw_init;
pub mod hw_timer;
pub mod task_pin;
