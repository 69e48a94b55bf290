//! Publish gateway — sends commands to remote parts and settles the
//! optimistic cache write from the broker acknowledgement.

use std::sync::Arc;
use std::time::Duration;

use panelhub_domain::error::PanelHubError;
use panelhub_domain::part::SignalKind;
use panelhub_domain::payload::BinaryTokens;
use panelhub_domain::state::{Confirmation, RemoteEntry, RemoteState};
use panelhub_domain::topic::TopicMapper;

use crate::ports::PubSubTransport;
use crate::services::correlator::SharedState;
use crate::services::live_observer::ObserverMessage;

/// What to write to a remote binary part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryCommand {
    Set(bool),
    /// Invert the last known state; a part never seen counts as off.
    Toggle,
}

/// Publishes on remote part topics with a bounded acknowledgement wait.
pub struct PublishGateway<T> {
    transport: Arc<T>,
    shared: SharedState,
    topics: TopicMapper,
    tokens: BinaryTokens,
    ack_timeout: Duration,
}

impl<T: PubSubTransport> PublishGateway<T> {
    pub fn new(
        transport: Arc<T>,
        shared: SharedState,
        topics: TopicMapper,
        tokens: BinaryTokens,
        ack_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            shared,
            topics,
            tokens,
            ack_timeout,
        }
    }

    /// Publish a raw payload on the topic of remote part `name`.
    ///
    /// # Errors
    ///
    /// Returns [`PanelHubError::UnknownPart`], [`PanelHubError::Publish`] or
    /// [`PanelHubError::AckTimeout`].
    pub async fn publish(&self, name: &str, payload: Vec<u8>) -> Result<(), PanelHubError> {
        let remote = self.shared.registry.remote(name)?;
        self.send(&self.topics.topic_for(&remote.part.name), payload)
            .await
    }

    /// Flip remote binary part `name` optimistically and publish the new
    /// state.
    ///
    /// On acknowledgement the cache entry is confirmed. A publish that never
    /// left the process is rolled back. An ack timeout or a connection lost
    /// after hand-off leaves the new state in place flagged unconfirmed.
    ///
    /// # Errors
    ///
    /// Returns [`PanelHubError::UnknownPart`] without publishing when `name`
    /// is not a remote binary part, otherwise the publish failure.
    pub async fn write_binary(
        &self,
        name: &str,
        command: BinaryCommand,
    ) -> Result<RemoteEntry, PanelHubError> {
        let remote = self.shared.registry.remote_of(name, SignalKind::Binary)?;
        let previous = self.shared.cache.get(name);
        let on = match command {
            BinaryCommand::Set(on) => on,
            BinaryCommand::Toggle => !previous
                .as_ref()
                .and_then(|entry| entry.state.as_on())
                .unwrap_or(false),
        };

        let Some(pending) = self.shared.record(
            &remote.part,
            SignalKind::Binary,
            RemoteState::Binary { on },
            Confirmation::Pending,
        ) else {
            return Err(PanelHubError::UnknownPart(name.to_string()));
        };
        let mut guard = PendingWrite {
            shared: &self.shared,
            entry: &pending,
            settled: false,
        };

        let topic = self.topics.topic_for(name);
        let payload = self.tokens.encode(on).as_bytes().to_vec();
        let outcome = self.send(&topic, payload).await;
        guard.settled = true;

        match outcome {
            Ok(()) => Ok(self.settle(&pending, Confirmation::Confirmed)),
            Err(PanelHubError::Publish(error)) if !error.is_ambiguous() => {
                self.roll_back(&pending, previous);
                Err(PanelHubError::Publish(error))
            }
            Err(error) => {
                self.settle(&pending, Confirmation::Unconfirmed);
                Err(error)
            }
        }
    }

    async fn send(&self, topic: &str, payload: Vec<u8>) -> Result<(), PanelHubError> {
        match tokio::time::timeout(self.ack_timeout, self.transport.publish(topic, payload)).await
        {
            Ok(Ok(())) => {
                tracing::debug!(%topic, "publish acknowledged");
                Ok(())
            }
            Ok(Err(error)) => {
                tracing::warn!(%topic, %error, "publish failed");
                Err(PanelHubError::Publish(error))
            }
            Err(_) => {
                tracing::warn!(%topic, timeout = ?self.ack_timeout, "publish not acknowledged");
                Err(PanelHubError::AckTimeout {
                    topic: topic.to_string(),
                    waited: self.ack_timeout,
                })
            }
        }
    }

    /// Put back the state `pending` replaced, unless a newer write already
    /// replaced it too.
    ///
    /// The observer never received `pending`, but one that connected while
    /// it was in the cache has not seen `previous` either.
    fn roll_back(&self, pending: &RemoteEntry, previous: Option<RemoteEntry>) {
        let name = &pending.part.name;
        if !self
            .shared
            .cache
            .restore(name, pending.revision, previous.clone())
        {
            return;
        }
        tracing::debug!(part = %name, "optimistic write rolled back");
        if let Some(part) = previous {
            self.shared.observer.push(ObserverMessage::Update { part });
        }
    }

    /// Record `confirmation` for the optimistic write, unless a newer write
    /// already replaced it.
    fn settle(&self, pending: &RemoteEntry, confirmation: Confirmation) -> RemoteEntry {
        settle(&self.shared, pending, confirmation)
    }
}

fn settle(shared: &SharedState, pending: &RemoteEntry, confirmation: Confirmation) -> RemoteEntry {
    match shared
        .cache
        .confirm(&pending.part.name, pending.revision, confirmation)
    {
        Some(entry) => {
            shared.observer.push(ObserverMessage::Update {
                part: entry.clone(),
            });
            entry
        }
        None => {
            tracing::debug!(part = %pending.part.name, "write superseded before settling");
            RemoteEntry {
                confirmation,
                ..pending.clone()
            }
        }
    }
}

/// Flags the optimistic write unconfirmed if the caller goes away before
/// the publish resolves.
struct PendingWrite<'a> {
    shared: &'a SharedState,
    entry: &'a RemoteEntry,
    settled: bool,
}

impl Drop for PendingWrite<'_> {
    fn drop(&mut self) {
        if !self.settled {
            settle(self.shared, self.entry, Confirmation::Unconfirmed);
        }
    }
}
