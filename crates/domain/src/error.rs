//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`PanelHubError`] at port boundaries.

use std::time::Duration;

/// Top-level error returned by application services.
#[derive(Debug, thiserror::Error)]
pub enum PanelHubError {
    /// A domain invariant was violated by the caller's input.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// No part with this name exists in the requested category.
    #[error("part {0:?} not found")]
    UnknownPart(String),

    /// A part with this name already exists in the category.
    #[error("part {0:?} already exists")]
    Conflict(String),

    /// The transport refused or failed the subscription.
    #[error("subscribe failed")]
    Subscribe(#[source] TransportError),

    /// The transport refused or failed the publication.
    #[error("publish failed")]
    Publish(#[source] TransportError),

    /// No message arrived on the topic within the bound.
    #[error("no reading on {topic} within {waited:?}")]
    Timeout { topic: String, waited: Duration },

    /// The broker did not acknowledge a publication within the bound.
    ///
    /// The optimistic state stays in place, flagged unconfirmed.
    #[error("publish on {topic} not acknowledged within {waited:?}")]
    AckTimeout { topic: String, waited: Duration },
}

/// Domain validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("part name must not be empty")]
    EmptyName,

    #[error("part name must not contain whitespace, '/', '+' or '#'")]
    InvalidName,

    #[error("local parts require a pin")]
    MissingPin,

    #[error("binary payload tokens must not be empty")]
    EmptyToken,

    #[error("binary payload tokens must differ")]
    AmbiguousTokens,

    #[error("topic prefix must not be empty")]
    EmptyTopicPrefix,

    #[error("topic prefix must not contain whitespace, '+', '#' or empty levels")]
    InvalidTopicPrefix,

    #[error("read timeout must be between 1 and {}ms", .max.as_millis())]
    ReadTimeoutOutOfRange { max: Duration },
}

/// Failures reported by a publish/subscribe transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The broker is unreachable; the request never left the process.
    #[error("broker not connected")]
    NotConnected,

    /// The connection dropped after the request was handed to the client.
    #[error("connection lost before acknowledgement")]
    ConnectionLost,

    /// The underlying client rejected the request.
    #[error("transport client error")]
    Client(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The transport did not answer a subscribe or unsubscribe in time.
    #[error("transport did not answer within {0:?}")]
    Unresponsive(Duration),
}

impl TransportError {
    /// Whether the message may have reached the broker despite the error.
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::ConnectionLost)
    }
}
