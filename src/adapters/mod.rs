//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements                  | Connects to               |
//! |-------------|-----------------------------|---------------------------|
//! | `hardware`  | TemperaturePort             | DS18B20 on 1-Wire GPIO    |
//! |             | ActuatorPort                | LEDC fan PWM              |
//! | `log_sink`  | EventSink                   | Serial log output         |
//! | `mqtt`      | EventSink, inbound dispatch | ESP-IDF MQTT client       |
//! | `display`   | EventSink                   | OLED status text          |
//! | `nvs`       | ConfigPort, StoragePort     | NVS / in-memory store     |
//! | `wifi`      | (credentials via StoragePort) | ESP-IDF WiFi STA        |

pub mod device_id;
pub mod display;
pub mod hardware;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod wifi;
