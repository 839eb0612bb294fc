//! Thermofan firmware library.
//!
//! Exposes the control core, the 1-Wire driver and the adapters for
//! integration testing. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod events;
pub mod onewire;
pub mod pins;
pub mod protocol;

#[cfg(target_os = "espidf")]
mod esp_link_shims;
