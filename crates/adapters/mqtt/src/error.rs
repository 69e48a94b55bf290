//! MQTT adapter error types.

use panelhub_domain::error::TransportError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The broker connection is down.
    #[error("MQTT client not connected")]
    NotConnected,

    /// The configured QoS level does not exist.
    #[error("invalid MQTT QoS level {0}")]
    InvalidQos(u8),

    /// The rumqttc client refused the request.
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),
}

impl From<MqttError> for TransportError {
    fn from(err: MqttError) -> Self {
        match err {
            MqttError::NotConnected => Self::NotConnected,
            other => Self::Client(Box::new(other)),
        }
    }
}
