//! MQTT adapter: status out, commands and config in.
//!
//! | Topic                        | Direction | Payload                         |
//! |------------------------------|-----------|---------------------------------|
//! | `esp32/fan_control/status`   | out       | `{"temp","speed","mode"}`       |
//! | `esp32/fan_control/info`     | out       | `{"device_id","firmware"}`      |
//! | `esp32/fan_control/command`  | in        | `{"speed"?, "mode"?}`           |
//! | `esp32/fan_control/config`   | in        | `{"temp_threshold"?, "max_speed"?}` |
//!
//! Inbound messages are applied from the client's event callback straight
//! through [`ControlPort`]; the callback never touches the fan. When a
//! message needs an immediate refresh it queues [`Event::Republish`] for
//! the control task.
//!
//! Outbound status goes through a token bucket. A report that finds the
//! bucket empty is parked and sent by [`MqttStatusSink::flush_pending`]
//! once a token is back, so the broker always ends up with the latest
//! state even while the encoder is spinning.

use core::time::Duration;

use burster::Limiter;
use log::{debug, info, warn};

use crate::app::events::{AppEvent, StatusReport};
use crate::app::ports::{ControlPort, EventSink};
use crate::error::{CommsError, Error};
use crate::events::{Event, EventQueue};
use crate::protocol::{self, ParseError};

pub const TOPIC_STATUS: &str = "esp32/fan_control/status";
pub const TOPIC_COMMAND: &str = "esp32/fan_control/command";
pub const TOPIC_CONFIG: &str = "esp32/fan_control/config";
pub const TOPIC_INFO: &str = "esp32/fan_control/info";

/// Sustained status publishes per second.
const STATUS_RATE_PER_SEC: u64 = 4;
/// Back-to-back publishes allowed before the rate applies.
const STATUS_BURST: u64 = 4;

// ───────────────────────────────────────────────────────────────
// Publisher seam
// ───────────────────────────────────────────────────────────────

/// Anything that can put a payload on a topic.
pub trait MqttPublisher {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError>;
}

// ───────────────────────────────────────────────────────────────
// Status sink
// ───────────────────────────────────────────────────────────────

pub struct MqttStatusSink<P> {
    publisher: P,
    limiter: burster::TokenBucket<fn() -> Duration>,
    pending: Option<StatusReport>,
    published: u32,
    suppressed: u32,
}

impl<P: MqttPublisher> MqttStatusSink<P> {
    pub fn new(publisher: P) -> Self {
        Self {
            publisher,
            limiter: burster::TokenBucket::new_with_time_provider(
                STATUS_RATE_PER_SEC,
                STATUS_BURST,
                platform_now as fn() -> Duration,
            ),
            pending: None,
            published: 0,
            suppressed: 0,
        }
    }

    /// One-shot `{"device_id","firmware"}` after (re)connect. Not rate-limited.
    pub fn publish_device_info(&mut self, device_id: &str, firmware: &str) -> Result<(), CommsError> {
        let payload = protocol::format_device_info(device_id, firmware);
        self.publisher.publish(TOPIC_INFO, &payload)?;
        info!("MQTT: device info published ({})", device_id);
        Ok(())
    }

    /// Send a parked report if the bucket has refilled. Returns `true` if
    /// something was published.
    pub fn flush_pending(&mut self) -> bool {
        let Some(report) = self.pending else {
            return false;
        };
        if self.limiter.try_consume(1).is_err() {
            return false;
        }
        self.pending = None;
        self.send(&report)
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut P {
        &mut self.publisher
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn published(&self) -> u32 {
        self.published
    }

    /// Reports that were parked and later superseded.
    pub fn suppressed(&self) -> u32 {
        self.suppressed
    }

    fn offer(&mut self, report: StatusReport) {
        if self.limiter.try_consume(1).is_ok() {
            self.pending = None;
            self.send(&report);
        } else {
            if self.pending.replace(report).is_some() {
                self.suppressed += 1;
            }
            debug!("MQTT: status rate limited, parked");
        }
    }

    fn send(&mut self, report: &StatusReport) -> bool {
        // A fault reports the sentinel so subscribers can tell it from a
        // real low reading.
        let payload = protocol::format_status(report.temperature.celsius(), report.speed, report.mode);
        match self.publisher.publish(TOPIC_STATUS, &payload) {
            Ok(()) => {
                self.published += 1;
                true
            }
            Err(e) => {
                debug!("MQTT: status not sent: {}", e);
                false
            }
        }
    }
}

impl<P: MqttPublisher> EventSink for MqttStatusSink<P> {
    fn emit(&mut self, event: &AppEvent) {
        match *event {
            AppEvent::Status(report) => self.offer(report),
            AppEvent::SensorFault { mode, held_duty } => self.offer(StatusReport {
                temperature: crate::onewire::ds18b20::TemperatureReading::Fault,
                speed: held_duty,
                mode,
            }),
            AppEvent::ModeChanged { .. } | AppEvent::SettingsChanged { .. } | AppEvent::Started(_) => {}
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Inbound
// ───────────────────────────────────────────────────────────────

/// What an inbound message did to the shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    /// A command was applied; `republish` if a refresh was queued.
    Command { republish: bool },
    /// A config update was applied; `changed` if a setting moved.
    Config { changed: bool },
    /// Not one of our topics.
    Ignored,
}

/// Parse and apply one inbound message. A payload that fails to parse
/// leaves the state untouched.
pub fn handle_inbound<const N: usize>(
    topic: &str,
    payload: &[u8],
    control: &impl ControlPort,
    events: &EventQueue<N>,
) -> Result<InboundOutcome, Error> {
    match topic {
        TOPIC_COMMAND => {
            let command = protocol::parse_command(payload).map_err(|e| rejected(topic, e))?;
            let t = control.on_command(&command);
            let republish = t.requires_republish();
            if republish && !events.push(Event::Republish) {
                warn!("MQTT: event queue full, refresh deferred to next cycle");
            }
            debug!("MQTT: command {:?} -> mode={:?} manual_speed={}", command, t.after.mode(), t.after.manual_speed());
            Ok(InboundOutcome::Command { republish })
        }
        TOPIC_CONFIG => {
            let config = protocol::parse_config(payload).map_err(|e| rejected(topic, e))?;
            let t = control.on_config(&config);
            let changed = t.settings_changed();
            if changed && !events.push(Event::SettingsChanged) {
                warn!("MQTT: event queue full, settings save deferred");
            }
            Ok(InboundOutcome::Config { changed })
        }
        _ => Ok(InboundOutcome::Ignored),
    }
}

fn rejected(topic: &str, e: ParseError) -> Error {
    warn!("MQTT: rejected payload on {}: {}", topic, e);
    Error::Protocol(e)
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF client
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::{connect, EspPublisher};

#[cfg(target_os = "espidf")]
mod esp {
    use core::sync::atomic::{AtomicBool, Ordering};
    use core::time::Duration;
    use std::sync::Arc;

    use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};
    use log::{info, warn};

    use super::{handle_inbound, MqttPublisher, TOPIC_COMMAND, TOPIC_CONFIG};
    use crate::app::state::SharedState;
    use crate::config::SystemConfig;
    use crate::error::CommsError;
    use crate::events::EVENTS;

    static CONNECTED: AtomicBool = AtomicBool::new(false);
    /// Set by the callback on every (re)connect; the control task
    /// subscribes and announces itself when it sees it.
    static NEEDS_SUBSCRIBE: AtomicBool = AtomicBool::new(false);

    pub struct EspPublisher {
        client: EspMqttClient<'static>,
    }

    impl EspPublisher {
        pub fn is_connected(&self) -> bool {
            CONNECTED.load(Ordering::Acquire)
        }

        /// Subscribe after a (re)connect. Returns `true` once per session.
        pub fn subscribe_if_needed(&mut self) -> bool {
            if !NEEDS_SUBSCRIBE.swap(false, Ordering::AcqRel) {
                return false;
            }
            for topic in [TOPIC_COMMAND, TOPIC_CONFIG] {
                if let Err(e) = self.client.subscribe(topic, QoS::AtLeastOnce) {
                    warn!("MQTT: subscribe {} failed: {}", topic, e);
                    NEEDS_SUBSCRIBE.store(true, Ordering::Release);
                    return false;
                }
            }
            info!("MQTT: subscribed to command and config topics");
            true
        }
    }

    impl MqttPublisher for EspPublisher {
        fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
            if !self.is_connected() {
                return Err(CommsError::MqttNotConnected);
            }
            self.client
                .enqueue(topic, QoS::AtMostOnce, false, payload)
                .map(|_| ())
                .map_err(|_| CommsError::MqttPublishFailed)
        }
    }

    /// Start the client. Inbound messages are applied to `state` from the
    /// client task.
    pub fn connect(
        config: &SystemConfig,
        client_id: &str,
        state: Arc<SharedState>,
    ) -> Result<EspPublisher, CommsError> {
        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            keep_alive_interval: Some(Duration::from_secs(u64::from(config.mqtt_keepalive_secs))),
            reconnect_timeout: Some(Duration::from_millis(u64::from(config.mqtt_reconnect_timeout_ms))),
            network_timeout: Duration::from_millis(u64::from(config.mqtt_network_timeout_ms)),
            ..Default::default()
        };

        let client = EspMqttClient::new_cb(config.mqtt_broker_uri.as_str(), &conf, move |event| {
            match event.payload() {
                EventPayload::Connected(_) => {
                    info!("MQTT: connected");
                    CONNECTED.store(true, Ordering::Release);
                    NEEDS_SUBSCRIBE.store(true, Ordering::Release);
                }
                EventPayload::Disconnected => {
                    warn!("MQTT: disconnected");
                    CONNECTED.store(false, Ordering::Release);
                }
                EventPayload::Received { topic: Some(topic), data, .. } => {
                    // Errors are logged inside; nothing else to do here.
                    let _ = handle_inbound(topic, data, &*state, &EVENTS);
                }
                EventPayload::Error(e) => warn!("MQTT: {:?}", e),
                _ => {}
            }
        })
        .map_err(|e| {
            warn!("MQTT: client start failed: {}", e);
            CommsError::MqttNotConnected
        })?;

        info!("MQTT: client started ({})", config.mqtt_broker_uri);
        Ok(EspPublisher { client })
    }
}

// ───────────────────────────────────────────────────────────────
// Clock
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn platform_now() -> Duration {
    // SAFETY: esp_timer_get_time is a read of the monotonic system timer.
    let us = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
    Duration::from_micros(us as u64)
}

#[cfg(not(target_os = "espidf"))]
fn platform_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}
