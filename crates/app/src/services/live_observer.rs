//! Live observer fan-out — pushes remote state changes to the single
//! connected real-time observer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use panelhub_domain::state::{Confirmation, RemoteEntry};

use crate::services::state_cache::StateCache;

/// A message delivered to the observer, serialized as
/// `{"type": "snapshot" | "update" | "removed", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObserverMessage {
    /// Every cached remote part with a settled state, sent right after
    /// connecting.
    Snapshot { parts: Vec<RemoteEntry> },
    /// One part changed.
    Update { part: RemoteEntry },
    /// A remote part was deleted.
    Removed { name: String },
}

/// The receiving end handed to a newly connected observer.
#[derive(Debug)]
pub struct ObserverConnection {
    /// Pass back to [`LiveObserver::disconnect`].
    pub id: u64,
    pub messages: mpsc::Receiver<ObserverMessage>,
}

struct Attached {
    id: u64,
    tx: mpsc::Sender<ObserverMessage>,
}

/// Holds at most one observer. Connecting a new one silently evicts the
/// previous one, whose receiver then sees the channel close.
pub struct LiveObserver {
    cache: Arc<StateCache>,
    current: Mutex<Option<Attached>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl LiveObserver {
    /// Create a fan-out reading snapshots from `cache`.
    ///
    /// `buffer` bounds the number of undelivered messages per observer;
    /// overflow is dropped rather than blocking the publisher.
    #[must_use]
    pub fn new(cache: Arc<StateCache>, buffer: usize) -> Self {
        Self {
            cache,
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Attach a new observer, replacing any existing one, and immediately
    /// queue a snapshot of the cache. Writes still awaiting their
    /// acknowledgement are left out; they follow as updates once settled.
    pub fn connect(&self) -> ObserverConnection {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, messages) = mpsc::channel(self.buffer);

        // Snapshot under the lock so no concurrent push can slip in between
        // the snapshot and attachment.
        let mut current = self.lock();
        let parts = self
            .cache
            .snapshot()
            .into_iter()
            .filter(|entry| entry.confirmation != Confirmation::Pending)
            .collect();
        let snapshot = ObserverMessage::Snapshot { parts };
        if tx.try_send(snapshot).is_err() {
            tracing::warn!(observer = id, "failed to queue initial snapshot");
        }
        if let Some(previous) = current.replace(Attached { id, tx }) {
            tracing::info!(evicted = previous.id, observer = id, "live observer replaced");
        } else {
            tracing::info!(observer = id, "live observer connected");
        }

        ObserverConnection { id, messages }
    }

    /// Detach observer `id`. Returns `false` if it was already replaced.
    pub fn disconnect(&self, id: u64) -> bool {
        let mut current = self.lock();
        if current.as_ref().is_some_and(|attached| attached.id == id) {
            *current = None;
            tracing::info!(observer = id, "live observer disconnected");
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    /// Deliver `message` to the connected observer. A no-op without one.
    pub fn push(&self, message: ObserverMessage) {
        let mut current = self.lock();
        let Some(attached) = current.as_ref() else {
            return;
        };
        match attached.tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(observer = attached.id, "live observer lagging, update dropped");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(observer = attached.id, "live observer gone");
                *current = None;
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Attached>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
