//! Device identity derived from the ESP32 factory MAC address.
//!
//! The short ID `FC-XXYYZZ` (last 3 MAC bytes, uppercase hex) is stable
//! across reboots. It is used as the MQTT client id and reported in the
//! device-info message. The hostname form is `thermofan-xxyyzz`.

use core::fmt::Write;

/// "FC-XXYYZZ" (9 chars).
pub type DeviceIdString = heapless::String<16>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: the buffer is exactly the 6 bytes the call writes.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

pub fn device_id(mac: &MacAddress) -> DeviceIdString {
    let mut id = DeviceIdString::new();
    let _ = write!(id, "FC-{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5]);
    id
}

pub fn hostname(mac: &MacAddress) -> heapless::String<24> {
    let mut name = heapless::String::<24>::new();
    let _ = write!(name, "thermofan-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    name
}
