//! WiFi station-mode adapter.
//!
//! Credentials are provisioned out of band and read from the `storage`
//! NVS namespace at boot. With no stored credentials the node runs
//! offline: the encoder and the control loop keep working, only the
//! MQTT surface is absent.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: blocking ESP-IDF WiFi driver via `esp_idf_svc::wifi`.
//! - **all other targets**: credential handling only.

use core::fmt;
use log::{info, warn};

use crate::app::ports::{StorageError, StoragePort};

pub const CREDENTIALS_NAMESPACE: &str = "storage";
pub const SSID_KEY: &str = "wifi_ssid";
pub const PASSWORD_KEY: &str = "wifi_password";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsError {
    InvalidSsid,
    InvalidPassword,
}

impl fmt::Display for CredentialsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), CredentialsError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(CredentialsError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), CredentialsError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(CredentialsError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Credentials
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    ssid: heapless::String<32>,
    password: heapless::String<64>,
}

impl WifiCredentials {
    pub fn new(ssid: &str, password: &str) -> Result<Self, CredentialsError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        let mut creds = Self { ssid: heapless::String::new(), password: heapless::String::new() };
        creds.ssid.push_str(ssid).map_err(|_| CredentialsError::InvalidSsid)?;
        creds.password.push_str(password).map_err(|_| CredentialsError::InvalidPassword)?;
        Ok(creds)
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Stored credentials, or `None` if absent or invalid.
    pub fn load(storage: &impl StoragePort) -> Option<Self> {
        if !storage.exists(CREDENTIALS_NAMESPACE, SSID_KEY) {
            info!("WiFi: no stored credentials");
            return None;
        }
        // One spare byte so an over-long stored value fails validation
        // instead of being silently cut to fit.
        let mut ssid_buf = [0u8; 33];
        let mut pass_buf = [0u8; 65];
        let ssid_len = match storage.read_str(CREDENTIALS_NAMESPACE, SSID_KEY, &mut ssid_buf) {
            Ok(len) => len,
            Err(e) => {
                warn!("WiFi: stored SSID unreadable: {}", e);
                return None;
            }
        };
        let pass_len = match storage.read_str(CREDENTIALS_NAMESPACE, PASSWORD_KEY, &mut pass_buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => 0,
            Err(e) => {
                warn!("WiFi: stored password unreadable: {}", e);
                return None;
            }
        };

        let ssid = core::str::from_utf8(&ssid_buf[..ssid_len]).ok()?;
        let password = core::str::from_utf8(&pass_buf[..pass_len]).ok()?;
        match Self::new(ssid, password) {
            Ok(creds) => Some(creds),
            Err(e) => {
                warn!("WiFi: stored credentials rejected: {}", e);
                None
            }
        }
    }

    pub fn store(&self, storage: &mut impl StoragePort) -> Result<(), StorageError> {
        storage.write_str(CREDENTIALS_NAMESPACE, SSID_KEY, &self.ssid)?;
        storage.write_str(CREDENTIALS_NAMESPACE, PASSWORD_KEY, &self.password)
    }
}

// ───────────────────────────────────────────────────────────────
// Station bring-up
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub fn connect(
    modem: esp_idf_hal::modem::Modem,
    sysloop: esp_idf_svc::eventloop::EspSystemEventLoop,
    nvs: Option<esp_idf_svc::nvs::EspDefaultNvsPartition>,
    creds: &WifiCredentials,
) -> Result<esp_idf_svc::wifi::BlockingWifi<esp_idf_svc::wifi::EspWifi<'static>>, crate::error::CommsError> {
    use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
    use crate::error::CommsError;

    let fail = |e: esp_idf_svc::sys::EspError| {
        warn!("WiFi: {}", e);
        CommsError::WifiConnectFailed
    };

    let esp_wifi = EspWifi::new(modem, sysloop.clone(), nvs).map_err(fail)?;
    let mut wifi = BlockingWifi::wrap(esp_wifi, sysloop).map_err(fail)?;

    let auth_method = if creds.password.is_empty() { AuthMethod::None } else { AuthMethod::WPA2Personal };
    let client = ClientConfiguration {
        ssid: creds.ssid.as_str().try_into().map_err(|_| CommsError::WifiConnectFailed)?,
        password: creds.password.as_str().try_into().map_err(|_| CommsError::WifiConnectFailed)?,
        auth_method,
        ..Default::default()
    };
    wifi.set_configuration(&Configuration::Client(client)).map_err(fail)?;
    wifi.start().map_err(fail)?;
    info!("WiFi: connecting to '{}'", creds.ssid);
    wifi.connect().map_err(fail)?;
    wifi.wait_netif_up().map_err(fail)?;
    info!("WiFi: connected");
    Ok(wifi)
}
