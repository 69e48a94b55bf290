//! Topic lifecycle — reference-counted transport subscriptions and the
//! per-caller leases that hold them.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex;

use panelhub_domain::error::TransportError;
use panelhub_domain::id::SubscriptionId;

use super::slots::SlotTable;
use crate::ports::{InboundHandler, PubSubTransport};

/// Subscription state of one topic. `generation` is set while the
/// transport subscription exists.
#[derive(Default)]
struct TopicState {
    holders: usize,
    generation: Option<u64>,
}

type Topics = std::sync::Mutex<HashMap<String, Arc<Mutex<TopicState>>>>;

/// Subscribes a topic on its first holder and unsubscribes it when the
/// last one lets go.
///
/// Each topic has its own lock, held across that topic's transport call,
/// so subscribe and unsubscribe never interleave for one topic while other
/// topics proceed. Every transport call is bounded by `timeout`.
pub(crate) struct TopicLifecycle<T> {
    transport: Arc<T>,
    timeout: Duration,
    topics: Topics,
    next_generation: AtomicU64,
}

impl<T: PubSubTransport + 'static> TopicLifecycle<T> {
    pub(crate) fn new(transport: Arc<T>, timeout: Duration) -> Self {
        Self {
            transport,
            timeout,
            topics: std::sync::Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Take one hold on `topic`, subscribing `handler` if nobody held it.
    /// Returns the generation the hold belongs to.
    pub(crate) async fn acquire(
        &self,
        topic: &str,
        handler: Arc<dyn InboundHandler>,
    ) -> Result<u64, TransportError> {
        let entry = self.entry(topic);
        let mut state = entry.lock().await;
        if let Some(generation) = state.generation {
            state.holders += 1;
            return Ok(generation);
        }

        let mut attempt = SubscribeAttempt {
            topic,
            entry: &entry,
            transport: &self.transport,
            timeout: self.timeout,
            settled: false,
        };
        let subscribed = bounded(self.timeout, self.transport.subscribe(topic, handler)).await;
        // A stalled subscribe may still land later.
        attempt.settled = !matches!(subscribed, Err(TransportError::Unresponsive(_)));
        if let Err(error) = subscribed {
            drop(attempt);
            drop(state);
            drop(entry);
            self.prune(topic);
            return Err(error);
        }
        tracing::debug!(%topic, "topic subscribed");

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        *state = TopicState {
            holders: 1,
            generation: Some(generation),
        };
        Ok(generation)
    }

    /// Drop one hold taken at `generation`. Holds from a generation that
    /// was already torn down are ignored.
    pub(crate) async fn release(&self, topic: &str, generation: u64) {
        let entry = self.entry(topic);
        let mut state = entry.lock().await;
        if state.generation == Some(generation) {
            state.holders -= 1;
            if state.holders == 0 {
                state.generation = None;
                self.unsubscribe(topic).await;
            }
        }
        drop(state);
        drop(entry);
        self.prune(topic);
    }

    /// Unsubscribe `topic` regardless of outstanding holds.
    pub(crate) async fn tear_down(&self, topic: &str) {
        let entry = self.entry(topic);
        let mut state = entry.lock().await;
        if state.generation.take().is_some() {
            state.holders = 0;
            self.unsubscribe(topic).await;
        }
        drop(state);
        drop(entry);
        self.prune(topic);
    }

    async fn unsubscribe(&self, topic: &str) {
        match bounded(self.timeout, self.transport.unsubscribe(topic)).await {
            Ok(()) => tracing::debug!(%topic, "topic unsubscribed"),
            Err(error) => tracing::warn!(%topic, %error, "unsubscribe failed"),
        }
    }

    fn entry(&self, topic: &str) -> Arc<Mutex<TopicState>> {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(topics.entry(topic.to_string()).or_default())
    }

    /// Forget `topic` once it is unsubscribed and nobody else is using
    /// its state.
    fn prune(&self, topic: &str) {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = topics.get(topic).is_some_and(|entry| {
            Arc::strong_count(entry) == 1
                && entry
                    .try_lock()
                    .is_ok_and(|state| state.generation.is_none())
        });
        if idle {
            topics.remove(topic);
        }
    }

    #[cfg(test)]
    pub(crate) async fn holders(&self, topic: &str) -> usize {
        let entry = self
            .topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .cloned();
        match entry {
            Some(entry) => entry.lock().await.holders,
            None => 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_topics(&self) -> usize {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

async fn bounded(
    timeout: Duration,
    call: impl Future<Output = Result<(), TransportError>>,
) -> Result<(), TransportError> {
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or(Err(TransportError::Unresponsive(timeout)))
}

/// A subscribe in flight. If it never settles (it stalled, or the caller
/// was cancelled) the transport may still complete it, so a bounded
/// unsubscribe is spawned unless a later holder subscribed meanwhile.
struct SubscribeAttempt<'a, T: PubSubTransport + 'static> {
    topic: &'a str,
    entry: &'a Arc<Mutex<TopicState>>,
    transport: &'a Arc<T>,
    timeout: Duration,
    settled: bool,
}

impl<T: PubSubTransport + 'static> Drop for SubscribeAttempt<'_, T> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let topic = self.topic.to_string();
        let entry = Arc::clone(self.entry);
        let transport = Arc::clone(self.transport);
        let timeout = self.timeout;
        handle.spawn(async move {
            let state = entry.lock().await;
            if state.generation.is_some() {
                return;
            }
            if let Err(error) = bounded(timeout, transport.unsubscribe(&topic)).await {
                tracing::warn!(%topic, %error, "unsubscribe after stalled subscribe failed");
            }
        });
    }
}

/// One caller's claim on a delivery slot and on the topic subscription.
///
/// Call [`SlotLease::close`] on every normal exit. If the lease is dropped
/// instead (the caller's future was cancelled), the slot is removed at once
/// and the release is spawned onto the current runtime.
pub(crate) struct SlotLease<T: PubSubTransport + 'static, V: Clone + Send + 'static> {
    topic: String,
    id: SubscriptionId,
    generation: u64,
    slots: Arc<SlotTable<V>>,
    lifecycle: Arc<TopicLifecycle<T>>,
    released: bool,
}

impl<T: PubSubTransport + 'static, V: Clone + Send + 'static> SlotLease<T, V> {
    pub(crate) fn new(
        topic: String,
        id: SubscriptionId,
        generation: u64,
        slots: Arc<SlotTable<V>>,
        lifecycle: Arc<TopicLifecycle<T>>,
    ) -> Self {
        Self {
            topic,
            id,
            generation,
            slots,
            lifecycle,
            released: false,
        }
    }

    pub(crate) fn topic(&self) -> &str {
        &self.topic
    }

    pub(crate) async fn close(mut self) {
        self.slots.remove(&self.topic, self.id);
        self.lifecycle.release(&self.topic, self.generation).await;
        self.released = true;
    }
}

impl<T: PubSubTransport + 'static, V: Clone + Send + 'static> Drop for SlotLease<T, V> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.slots.remove(&self.topic, self.id);

        let lifecycle = Arc::clone(&self.lifecycle);
        let topic = std::mem::take(&mut self.topic);
        let generation = self.generation;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    lifecycle.release(&topic, generation).await;
                });
            }
            Err(_) => {
                tracing::warn!(
                    %topic,
                    subscription = %self.id,
                    "no runtime to release subscription"
                );
            }
        }
    }
}
