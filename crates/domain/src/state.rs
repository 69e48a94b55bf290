//! Remote part state as held by the state cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::part::{Part, SignalKind};

/// UTC timestamp of the last cache write.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Last known state of a remote part.
///
/// Serialized untagged so a flattened view reads `{"on": ..}` or
/// `{"value": ..}`. Analog readings stay strings: remote payloads carry
/// no declared precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteState {
    Binary { on: bool },
    Analog { value: String },
}

impl RemoteState {
    #[must_use]
    pub fn kind(&self) -> SignalKind {
        match self {
            Self::Binary { .. } => SignalKind::Binary,
            Self::Analog { .. } => SignalKind::Analog,
        }
    }

    /// The binary state, if this is one.
    #[must_use]
    pub fn as_on(&self) -> Option<bool> {
        match self {
            Self::Binary { on } => Some(*on),
            Self::Analog { .. } => None,
        }
    }
}

/// Whether a cached state is known to match the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confirmation {
    /// Reported by the device, or a publish the broker acknowledged.
    Confirmed,
    /// Optimistic write awaiting the broker acknowledgement.
    Pending,
    /// Acknowledgement never arrived; the device may or may not agree.
    Unconfirmed,
}

/// One state cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteEntry {
    #[serde(flatten)]
    pub part: Part,
    #[serde(flatten)]
    pub state: RemoteState,
    pub confirmation: Confirmation,
    pub last_updated: Timestamp,
    /// Bumped on every write; guards late confirmations and rollbacks.
    pub revision: u64,
}
