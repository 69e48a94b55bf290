//! MQTT transport configuration.

use std::time::Duration;

use rumqttc::{MqttOptions, QoS};
use serde::Deserialize;

use crate::error::MqttError;

/// Configuration for the MQTT transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address.
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// MQTT client identifier.
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// Delivery mode for publishes and subscriptions (0, 1 or 2).
    pub qos: u8,
    /// Pause between reconnection attempts, in milliseconds.
    pub reconnect_delay_ms: u64,
    /// Requests buffered between the client and its event loop.
    pub request_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "panelhub".to_string(),
            username: None,
            password: None,
            keep_alive_secs: 30,
            qos: 0,
            reconnect_delay_ms: 1000,
            request_capacity: 64,
        }
    }
}

impl MqttConfig {
    /// The configured delivery mode.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::InvalidQos`] for anything but 0, 1 or 2.
    pub fn qos(&self) -> Result<QoS, MqttError> {
        match self.qos {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(MqttError::InvalidQos(other)),
        }
    }

    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub(crate) fn options(&self) -> MqttOptions {
        let mut options =
            MqttOptions::new(&self.client_id, &self.broker_host, self.broker_port);
        options.set_keep_alive(Duration::from_secs(u64::from(self.keep_alive_secs.max(5))));
        options.set_clean_session(true);
        if let Some(username) = &self.username {
            options.set_credentials(username, self.password.as_deref().unwrap_or_default());
        }
        options
    }
}
