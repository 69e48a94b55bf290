//! Remote bridge — facade over the correlator, gateway, state cache and
//! live observer for one transport.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use panelhub_domain::error::{PanelHubError, ValidationError};
use panelhub_domain::id::PartId;
use panelhub_domain::part::{Category, Part, SignalKind};
use panelhub_domain::payload::BinaryTokens;
use panelhub_domain::state::{Confirmation, RemoteEntry, RemoteState, Timestamp};
use panelhub_domain::topic::TopicMapper;

use crate::ports::PubSubTransport;
use crate::services::correlator::{SharedState, SubscriptionCorrelator, Watch};
use crate::services::live_observer::{LiveObserver, ObserverMessage};
use crate::services::part_registry::{NewPart, PartRegistry, RemotePart};
use crate::services::publish_gateway::{BinaryCommand, PublishGateway};
use crate::services::state_cache::StateCache;

/// Tunables of the bridge.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub topics: TopicMapper,
    pub tokens: BinaryTokens,
    /// Default bound of [`RemoteBridge::read_analog`].
    pub read_timeout: Duration,
    /// Largest bound a caller of [`RemoteBridge::read_analog`] may ask for.
    pub max_read_timeout: Duration,
    /// Bound of every broker round trip: publish acknowledgements,
    /// subscribes and unsubscribes.
    pub ack_timeout: Duration,
    /// Undelivered messages kept for the live observer.
    pub observer_buffer: usize,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            topics: TopicMapper::default(),
            tokens: BinaryTokens::default(),
            read_timeout: Duration::from_secs(5),
            max_read_timeout: Duration::from_secs(30),
            ack_timeout: Duration::from_secs(3),
            observer_buffer: 64,
        }
    }
}

/// A registered remote part with its cached state, if any was seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemotePartStatus {
    #[serde(flatten)]
    pub part: Part,
    pub kind: SignalKind,
    #[serde(flatten)]
    pub state: Option<RemoteState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<Confirmation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Timestamp>,
}

impl RemotePartStatus {
    fn new(remote: RemotePart, entry: Option<RemoteEntry>) -> Self {
        let (state, confirmation, last_updated) = match entry {
            Some(entry) => (
                Some(entry.state),
                Some(entry.confirmation),
                Some(entry.last_updated),
            ),
            None => (None, None, None),
        };
        Self {
            part: remote.part,
            kind: remote.kind,
            state,
            confirmation,
            last_updated,
        }
    }
}

/// Everything the outer surfaces need to reach remote parts.
pub struct RemoteBridge<T: PubSubTransport + 'static> {
    shared: SharedState,
    correlator: SubscriptionCorrelator<T>,
    gateway: PublishGateway<T>,
    read_timeout: Duration,
    max_read_timeout: Duration,
}

impl<T: PubSubTransport + 'static> RemoteBridge<T> {
    pub fn new(transport: Arc<T>, registry: Arc<PartRegistry>, settings: BridgeSettings) -> Self {
        let cache = Arc::new(StateCache::new());
        let observer = Arc::new(LiveObserver::new(
            Arc::clone(&cache),
            settings.observer_buffer,
        ));
        let shared = SharedState {
            registry,
            cache,
            observer,
        };
        let correlator = SubscriptionCorrelator::new(
            Arc::clone(&transport),
            shared.clone(),
            settings.topics.clone(),
            settings.tokens.clone(),
            settings.ack_timeout,
        );
        let gateway = PublishGateway::new(
            transport,
            shared.clone(),
            settings.topics,
            settings.tokens,
            settings.ack_timeout,
        );
        Self {
            shared,
            correlator,
            gateway,
            read_timeout: settings.read_timeout,
            max_read_timeout: settings.max_read_timeout,
        }
    }

    /// Wait for the next reading of remote analog part `name`, bounded by
    /// `timeout` or the configured default.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ReadTimeoutOutOfRange`] when `timeout` is
    /// zero or above the configured maximum, otherwise see
    /// [`SubscriptionCorrelator::read_once`].
    pub async fn read_analog(
        &self,
        name: &str,
        timeout: Option<Duration>,
    ) -> Result<RemoteEntry, PanelHubError> {
        let timeout = timeout.unwrap_or(self.read_timeout);
        if timeout.is_zero() || timeout > self.max_read_timeout {
            return Err(ValidationError::ReadTimeoutOutOfRange {
                max: self.max_read_timeout,
            }
            .into());
        }
        self.correlator
            .read_once(name, SignalKind::Analog, timeout)
            .await
    }

    /// Open a standing read on remote part `name`, whatever its kind.
    ///
    /// # Errors
    ///
    /// See [`SubscriptionCorrelator::watch`].
    pub async fn watch(&self, name: &str) -> Result<Watch<T>, PanelHubError> {
        let remote = self.shared.registry.remote(name)?;
        self.correlator.watch(name, remote.kind).await
    }

    /// # Errors
    ///
    /// See [`PublishGateway::write_binary`].
    pub async fn write_binary(
        &self,
        name: &str,
        command: BinaryCommand,
    ) -> Result<RemoteEntry, PanelHubError> {
        self.gateway.write_binary(name, command).await
    }

    /// # Errors
    ///
    /// See [`PublishGateway::publish`].
    pub async fn publish(&self, name: &str, payload: Vec<u8>) -> Result<(), PanelHubError> {
        self.gateway.publish(name, payload).await
    }

    /// Last known state of remote binary part `name`, without touching the
    /// transport.
    ///
    /// # Errors
    ///
    /// Returns [`PanelHubError::UnknownPart`] when no such part exists.
    pub fn binary_state(&self, name: &str) -> Result<RemotePartStatus, PanelHubError> {
        let remote = self.shared.registry.remote_of(name, SignalKind::Binary)?;
        Ok(RemotePartStatus::new(remote, self.shared.cache.get(name)))
    }

    /// Every remote part, ordered by id.
    #[must_use]
    pub fn remote_parts(&self) -> Vec<RemotePartStatus> {
        let mut parts: Vec<RemotePartStatus> = self
            .shared
            .registry
            .remote_parts()
            .into_iter()
            .map(|remote| {
                let entry = self.shared.cache.get(&remote.part.name);
                RemotePartStatus::new(remote, entry)
            })
            .collect();
        parts.sort_by_key(|status| status.part.id);
        parts
    }

    /// Register a remote part carrying `kind` state.
    ///
    /// # Errors
    ///
    /// Returns a validation or conflict error from the registry.
    pub fn register(
        &self,
        id: Option<PartId>,
        name: String,
        kind: SignalKind,
    ) -> Result<RemotePartStatus, PanelHubError> {
        let category = match kind {
            SignalKind::Binary => Category::RemoteBinary,
            SignalKind::Analog => Category::RemoteAnalog,
        };
        let part = self.shared.registry.register(NewPart {
            id,
            name,
            pin: None,
            category,
        })?;
        Ok(RemotePartStatus::new(RemotePart { part, kind }, None))
    }

    /// Remove remote part `name`, its cached state and its subscriptions.
    /// Callers still waiting on it get [`PanelHubError::UnknownPart`].
    ///
    /// # Errors
    ///
    /// Returns [`PanelHubError::UnknownPart`] when no such part exists.
    pub async fn delete(&self, name: &str) -> Result<(), PanelHubError> {
        self.shared.registry.remove_remote(name)?;
        self.shared.cache.remove(name);
        self.correlator.close_part(name).await;
        self.shared.observer.push(ObserverMessage::Removed {
            name: name.to_string(),
        });
        tracing::info!(part = %name, "remote part deleted");
        Ok(())
    }

    #[must_use]
    pub fn observer(&self) -> &Arc<LiveObserver> {
        &self.shared.observer
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<StateCache> {
        &self.shared.cache
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<PartRegistry> {
        &self.shared.registry
    }
}
