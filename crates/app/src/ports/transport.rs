//! Publish/subscribe transport port.
//!
//! A transport moves string payloads between panelhub and remote devices
//! over named topics (an MQTT broker, an in-process loopback, ...).
//! Delivery is at-most-once; nothing here assumes a message arrives.

use std::future::Future;
use std::sync::Arc;

use panelhub_domain::error::TransportError;

/// Receives inbound messages for one subscribed topic.
///
/// Invoked on the transport's own task, concurrently with request
/// handlers. Implementations must return quickly and never block.
pub trait InboundHandler: Send + Sync {
    fn on_message(&self, topic: &str, payload: &[u8]);
}

/// A topic-based publish/subscribe transport.
///
/// A topic has at most one handler; subscribing again replaces it.
pub trait PubSubTransport: Send + Sync {
    /// Publish `payload` on `topic`.
    ///
    /// Resolves once the transport considers the message accepted (written
    /// for QoS 0, broker-acknowledged for QoS 1). Callers bound the wait.
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Start delivering messages on `topic` to `handler`.
    ///
    /// Fails fast with [`TransportError::NotConnected`] when the broker is
    /// unreachable.
    fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn InboundHandler>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Stop delivering `topic`. Once this resolves the handler is never
    /// invoked again. Unsubscribing an unknown topic is not an error.
    fn unsubscribe(&self, topic: &str) -> impl Future<Output = Result<(), TransportError>> + Send;
}

impl<T: PubSubTransport> PubSubTransport for Arc<T> {
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).publish(topic, payload)
    }

    fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn InboundHandler>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).subscribe(topic, handler)
    }

    fn unsubscribe(&self, topic: &str) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).unsubscribe(topic)
    }
}
