//! Control policy: pure functions from measurements to actuator targets.

pub mod speed_map;
