//! Loopback broker — an in-process [`PubSubTransport`].
//!
//! Publishes are delivered synchronously to the handler subscribed on the
//! topic and to every simulated device attached to it. Nothing leaves the
//! process, so acknowledgements are immediate.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use panelhub_app::ports::{InboundHandler, PubSubTransport};
use panelhub_domain::error::TransportError;

type Routes = HashMap<String, Arc<dyn InboundHandler>>;

/// In-memory message broker for demos and tests.
pub struct LoopbackBroker {
    subscriptions: RwLock<Routes>,
    devices: RwLock<HashMap<String, Vec<Arc<dyn InboundHandler>>>>,
    reachable: AtomicBool,
}

impl Default for LoopbackBroker {
    fn default() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            devices: RwLock::new(HashMap::new()),
            reachable: AtomicBool::new(true),
        }
    }
}

impl LoopbackBroker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the broker going away (`false`) or coming back (`true`).
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::Release);
        tracing::info!(reachable, "loopback broker reachability changed");
    }

    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Acquire)
    }

    /// Let a simulated device see every publish on `topic`.
    pub fn attach_device(&self, topic: &str, device: Arc<dyn InboundHandler>) {
        self.devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic.to_string())
            .or_default()
            .push(device);
    }

    /// Publish on behalf of a remote device. Only the subscribed handler
    /// sees it; returns whether one was there.
    pub fn inject(&self, topic: &str, payload: &[u8]) -> bool {
        if !self.is_reachable() {
            return false;
        }
        let handler = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .cloned();
        match handler {
            Some(handler) => {
                handler.on_message(topic, payload);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(topic)
    }

    fn deliver(&self, topic: &str, payload: &[u8]) {
        let devices = self
            .devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .cloned()
            .unwrap_or_default();
        for device in devices {
            device.on_message(topic, payload);
        }
        self.inject(topic, payload);
    }
}

impl PubSubTransport for LoopbackBroker {
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let result = if self.is_reachable() {
            self.deliver(topic, &payload);
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        };
        async move { result }
    }

    fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn InboundHandler>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let result = if self.is_reachable() {
            self.subscriptions
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(topic.to_string(), handler);
            tracing::debug!(%topic, "loopback subscription added");
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        };
        async move { result }
    }

    fn unsubscribe(&self, topic: &str) -> impl Future<Output = Result<(), TransportError>> + Send {
        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(topic);
        tracing::debug!(%topic, "loopback subscription removed");
        async { Ok(()) }
    }
}
