//! # panelhub-adapter-mqtt
//!
//! MQTT adapter — implements [`PubSubTransport`] on top of `rumqttc`.
//!
//! ## Responsibilities
//! - Connect to an MQTT broker and keep reconnecting while the process runs
//! - Route inbound publishes to the handler subscribed on their topic
//! - Resubscribe every live topic after a reconnect
//! - Resolve publishes once written (QoS 0) or acknowledged (QoS 1/2)
//!
//! ## Dependency rule
//! Same as other adapters: depends on `panelhub-app` and `panelhub-domain`.

mod acks;
pub mod config;
pub mod error;

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use rumqttc::{AsyncClient, Event, EventLoop, Outgoing, Packet, QoS};
use tokio::sync::oneshot;

use panelhub_app::ports::{InboundHandler, PubSubTransport};
use panelhub_domain::error::TransportError;

use crate::acks::AckQueue;
pub use crate::config::MqttConfig;
pub use crate::error::MqttError;

/// State shared between the transport handle and its event loop.
struct Shared {
    connected: AtomicBool,
    handlers: RwLock<HashMap<String, Arc<dyn InboundHandler>>>,
    acks: Mutex<AckQueue>,
}

impl Shared {
    fn acks(&self) -> std::sync::MutexGuard<'_, AckQueue> {
        self.acks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handler(&self, topic: &str) -> Option<Arc<dyn InboundHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .cloned()
    }

    fn topics(&self) -> Vec<String> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

/// MQTT-backed publish/subscribe transport.
///
/// Created together with the [`MqttEventLoop`] that must be driven for
/// anything to reach the broker.
pub struct MqttTransport {
    client: AsyncClient,
    qos: QoS,
    shared: Arc<Shared>,
    /// Keeps "queue ack waiter, hand request to client" atomic so waiters
    /// line up with the order rumqttc writes publishes.
    publish_order: tokio::sync::Mutex<()>,
}

impl MqttTransport {
    /// Build the client and its event loop from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::InvalidQos`] for an unsupported QoS level.
    pub fn new(config: &MqttConfig) -> Result<(Self, MqttEventLoop), MqttError> {
        let qos = config.qos()?;
        let (client, event_loop) = AsyncClient::new(config.options(), config.request_capacity);
        let shared = Arc::new(Shared {
            connected: AtomicBool::new(false),
            handlers: RwLock::new(HashMap::new()),
            acks: Mutex::new(AckQueue::new(qos)),
        });
        let driver = MqttEventLoop {
            event_loop,
            client: client.clone(),
            qos,
            shared: Arc::clone(&shared),
            reconnect_delay: config.reconnect_delay(),
        };
        tracing::info!(
            host = %config.broker_host,
            port = config.broker_port,
            client_id = %config.client_id,
            "MQTT transport configured"
        );
        Ok((
            Self {
                client,
                qos,
                shared,
                publish_order: tokio::sync::Mutex::new(()),
            },
            driver,
        ))
    }

    /// Whether the broker connection is currently up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    async fn send(&self, topic: String, payload: Vec<u8>) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(MqttError::NotConnected.into());
        }
        let (tx, rx) = oneshot::channel();
        {
            let _order = self.publish_order.lock().await;
            self.shared.acks().push(tx);
            if let Err(err) = self.client.publish(topic, self.qos, false, payload).await {
                self.shared.acks().pop_last();
                return Err(MqttError::Client(err).into());
            }
        }
        // A dropped waiter means the event loop is gone.
        rx.await.unwrap_or(Err(TransportError::ConnectionLost))
    }
}

impl PubSubTransport for MqttTransport {
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let topic = topic.to_string();
        async move { self.send(topic, payload).await }
    }

    fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn InboundHandler>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let topic = topic.to_string();
        async move {
            if !self.is_connected() {
                return Err(MqttError::NotConnected.into());
            }
            self.shared
                .handlers
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(topic.clone(), handler);
            if let Err(err) = self.client.subscribe(topic.as_str(), self.qos).await {
                self.shared
                    .handlers
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&topic);
                return Err(MqttError::Client(err).into());
            }
            tracing::debug!(%topic, "MQTT subscribe sent");
            Ok(())
        }
    }

    fn unsubscribe(&self, topic: &str) -> impl Future<Output = Result<(), TransportError>> + Send {
        let topic = topic.to_string();
        async move {
            self.shared
                .handlers
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&topic);
            if !self.is_connected() {
                return Ok(());
            }
            self.client
                .unsubscribe(topic)
                .await
                .map_err(|err| MqttError::Client(err).into())
        }
    }
}

/// Drives the rumqttc event loop: dispatches inbound publishes, settles
/// acknowledgements and reconnects after failures.
pub struct MqttEventLoop {
    event_loop: EventLoop,
    client: AsyncClient,
    qos: QoS,
    shared: Arc<Shared>,
    reconnect_delay: std::time::Duration,
}

impl MqttEventLoop {
    /// Poll until the task is aborted.
    pub async fn run(mut self) {
        loop {
            match self.event_loop.poll().await {
                Ok(event) => self.handle(event),
                Err(err) => {
                    let was_connected = self.shared.connected.swap(false, Ordering::AcqRel);
                    let failed = self.shared.acks().fail_all();
                    if was_connected {
                        tracing::warn!(error = %err, failed, "MQTT connection lost");
                    } else {
                        tracing::debug!(error = %err, "MQTT connection attempt failed");
                    }
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Incoming(Packet::ConnAck(_)) => {
                self.shared.connected.store(true, Ordering::Release);
                let topics = self.shared.topics();
                tracing::info!(resubscribed = topics.len(), "MQTT connected");
                for topic in topics {
                    if let Err(err) = self.client.try_subscribe(topic.as_str(), self.qos) {
                        tracing::warn!(%topic, error = %err, "MQTT resubscribe failed");
                    }
                }
            }
            Event::Incoming(Packet::Publish(publish)) => {
                match self.shared.handler(&publish.topic) {
                    Some(handler) => handler.on_message(&publish.topic, &publish.payload),
                    None => tracing::trace!(topic = %publish.topic, "unrouted MQTT message"),
                }
            }
            Event::Incoming(Packet::PubAck(ack)) => self.shared.acks().acknowledged(ack.pkid),
            Event::Incoming(Packet::PubComp(comp)) => self.shared.acks().acknowledged(comp.pkid),
            Event::Outgoing(Outgoing::Publish(pkid)) => self.shared.acks().written(pkid),
            _ => {}
        }
    }
}
