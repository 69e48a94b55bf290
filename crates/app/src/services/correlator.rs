//! Subscription correlator — request/response reads on top of pub/sub.
//!
//! Each read opens its own delivery slot on the part's topic. One
//! [`TopicHandler`] per topic writes the state cache, notifies the live
//! observer and fulfils every slot open at arrival time. The transport
//! subscription is shared and reference counted: it exists while at least
//! one slot lease holds it.

mod lease;
mod slots;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_stream::Stream;
use tokio_stream::wrappers::ReceiverStream;

use panelhub_domain::error::PanelHubError;
use panelhub_domain::id::SubscriptionId;
use panelhub_domain::part::{Part, SignalKind};
use panelhub_domain::payload::{BinaryTokens, decode_remote};
use panelhub_domain::state::{Confirmation, RemoteEntry, RemoteState};
use panelhub_domain::topic::TopicMapper;

use self::lease::{SlotLease, TopicLifecycle};
use self::slots::{DeliverySlot, SlotTable};
use crate::ports::{InboundHandler, PubSubTransport};
use crate::services::live_observer::{LiveObserver, ObserverMessage};
use crate::services::part_registry::PartRegistry;
use crate::services::state_cache::StateCache;

/// Values a standing reader may fall behind before new ones are dropped.
const WATCH_BUFFER: usize = 16;

/// Handles shared by the correlator and the handlers it installs.
#[derive(Clone)]
pub struct SharedState {
    pub registry: Arc<PartRegistry>,
    pub cache: Arc<StateCache>,
    pub observer: Arc<LiveObserver>,
}

impl SharedState {
    /// Cache `state` for `part` unless it left the registry, or its name
    /// went to another part, in the meantime.
    pub(crate) fn record(
        &self,
        part: &Part,
        kind: SignalKind,
        state: RemoteState,
        confirmation: Confirmation,
    ) -> Option<RemoteEntry> {
        self.cache.set_if(part, state, confirmation, || {
            self.registry
                .remote_of(&part.name, kind)
                .is_ok_and(|remote| remote.part.id == part.id)
        })
    }
}

/// Turns topic subscriptions into bounded request/response reads.
pub struct SubscriptionCorrelator<T: PubSubTransport + 'static> {
    shared: SharedState,
    topics: TopicMapper,
    tokens: BinaryTokens,
    lifecycle: Arc<TopicLifecycle<T>>,
    slots: Arc<SlotTable<RemoteEntry>>,
}

impl<T: PubSubTransport + 'static> SubscriptionCorrelator<T> {
    /// `transport_timeout` bounds every subscribe and unsubscribe call.
    pub fn new(
        transport: Arc<T>,
        shared: SharedState,
        topics: TopicMapper,
        tokens: BinaryTokens,
        transport_timeout: Duration,
    ) -> Self {
        Self {
            shared,
            topics,
            tokens,
            lifecycle: Arc::new(TopicLifecycle::new(transport, transport_timeout)),
            slots: Arc::new(SlotTable::default()),
        }
    }

    /// Wait up to `timeout` for the next value reported by remote part
    /// `name`. The bound covers subscribing as well as waiting.
    ///
    /// Every exit path releases the caller's slot, including cancellation
    /// of the returned future.
    ///
    /// # Errors
    ///
    /// - [`PanelHubError::UnknownPart`] if `name` is not a remote part of
    ///   `kind`, or if it is deleted while waiting.
    /// - [`PanelHubError::Subscribe`] as soon as the transport refuses the
    ///   subscription.
    /// - [`PanelHubError::Timeout`] if nothing arrives within `timeout`.
    pub async fn read_once(
        &self,
        name: &str,
        kind: SignalKind,
        timeout: Duration,
    ) -> Result<RemoteEntry, PanelHubError> {
        let deadline = Instant::now() + timeout;
        let timed_out = |topic: String| {
            tracing::debug!(%topic, ?timeout, "read timed out");
            PanelHubError::Timeout {
                topic,
                waited: timeout,
            }
        };

        let (tx, rx) = oneshot::channel();
        let opening = self.open(name, kind, DeliverySlot::Once(Some(tx)));
        let Ok(lease) = tokio::time::timeout_at(deadline, opening).await else {
            return Err(timed_out(self.topics.topic_for(name)));
        };
        let lease = lease?;
        let topic = lease.topic().to_string();

        let outcome = tokio::time::timeout_at(deadline, rx).await;
        lease.close().await;

        match outcome {
            Ok(Ok(entry)) => Ok(entry),
            Ok(Err(_)) => Err(PanelHubError::UnknownPart(name.to_string())),
            Err(_) => Err(timed_out(topic)),
        }
    }

    /// Open a standing read on remote part `name`.
    ///
    /// The stream first yields the cached state (if any), then every value
    /// that arrives until it is dropped or the part is deleted.
    ///
    /// # Errors
    ///
    /// Same as [`Self::read_once`], minus the timeout.
    pub async fn watch(&self, name: &str, kind: SignalKind) -> Result<Watch<T>, PanelHubError> {
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        let lease = self.open(name, kind, DeliverySlot::Standing(tx)).await?;
        Ok(Watch {
            initial: self.shared.cache.get(name),
            entries: ReceiverStream::new(rx),
            lease: Some(lease),
        })
    }

    /// Wake every caller waiting on `name` and drop its subscription.
    /// Called after the part has left the registry.
    pub async fn close_part(&self, name: &str) {
        let topic = self.topics.topic_for(name);
        let closed = self.slots.close_topic(&topic);
        self.lifecycle.tear_down(&topic).await;
        tracing::debug!(%topic, closed, "subscriptions closed");
    }

    async fn open(
        &self,
        name: &str,
        kind: SignalKind,
        slot: DeliverySlot<RemoteEntry>,
    ) -> Result<SlotLease<T, RemoteEntry>, PanelHubError> {
        let remote = self.shared.registry.remote_of(name, kind)?;
        let topic = self.topics.topic_for(&remote.part.name);

        // The slot exists before the subscription so an immediate reply
        // is not missed.
        let id = SubscriptionId::new();
        let reservation = self.slots.reserve(&topic, id, slot);

        let handler = Arc::new(TopicHandler {
            name: remote.part.name,
            kind,
            tokens: self.tokens.clone(),
            shared: self.shared.clone(),
            slots: Arc::clone(&self.slots),
        });
        let generation = match self.lifecycle.acquire(&topic, handler).await {
            Ok(generation) => generation,
            Err(error) => {
                tracing::warn!(%topic, %error, "subscribe failed");
                return Err(PanelHubError::Subscribe(error));
            }
        };
        reservation.keep();
        let lease = SlotLease::new(
            topic,
            id,
            generation,
            Arc::clone(&self.slots),
            Arc::clone(&self.lifecycle),
        );

        // Deleted while subscribing.
        if self.shared.registry.remote_of(name, kind).is_err() {
            lease.close().await;
            return Err(PanelHubError::UnknownPart(name.to_string()));
        }
        Ok(lease)
    }

    #[cfg(test)]
    fn open_slots(&self, name: &str) -> usize {
        self.slots.open_count(&self.topics.topic_for(name))
    }
}

/// A standing read. Yields cache entries as they are written.
pub struct Watch<T: PubSubTransport + 'static> {
    initial: Option<RemoteEntry>,
    entries: ReceiverStream<RemoteEntry>,
    lease: Option<SlotLease<T, RemoteEntry>>,
}

impl<T: PubSubTransport + 'static> Watch<T> {
    /// Release the slot and the subscription hold now rather than on drop.
    pub async fn close(mut self) {
        if let Some(lease) = self.lease.take() {
            lease.close().await;
        }
    }
}

impl<T: PubSubTransport + 'static> Stream for Watch<T> {
    type Item = RemoteEntry;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(entry) = this.initial.take() {
            return Poll::Ready(Some(entry));
        }
        Pin::new(&mut this.entries).poll_next(cx)
    }
}

/// The single inbound handler installed for a remote part's topic.
struct TopicHandler {
    name: String,
    kind: SignalKind,
    tokens: BinaryTokens,
    shared: SharedState,
    slots: Arc<SlotTable<RemoteEntry>>,
}

impl InboundHandler for TopicHandler {
    fn on_message(&self, topic: &str, payload: &[u8]) {
        let Ok(remote) = self.shared.registry.remote_of(&self.name, self.kind) else {
            tracing::debug!(%topic, "message for removed part ignored");
            return;
        };
        let Some(state) = decode_remote(self.kind, payload, &self.tokens) else {
            tracing::warn!(
                %topic,
                payload = %String::from_utf8_lossy(payload),
                "undecodable payload skipped"
            );
            return;
        };

        let Some(entry) =
            self.shared
                .record(&remote.part, self.kind, state, Confirmation::Confirmed)
        else {
            tracing::debug!(%topic, "message for removed part ignored");
            return;
        };
        self.shared.observer.push(ObserverMessage::Update {
            part: entry.clone(),
        });
        let delivered = self.slots.fulfil(topic, &entry);
        tracing::debug!(%topic, revision = entry.revision, delivered, "inbound message");
    }
}
