//! Application core: pure domain logic, zero I/O.
//!
//! Runtime state and its update rules live in [`state`], the control cycle
//! in [`service`]. All interaction with hardware happens through the port
//! traits in [`ports`], keeping this layer testable without peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
pub mod state;
