//! State cache — last known state per remote part.
//!
//! Writes are last-write-wins by arrival order. Payload timestamps are
//! ignored: remote devices are not assumed to have synchronized clocks.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use panelhub_domain::part::Part;
use panelhub_domain::state::{Confirmation, RemoteEntry, RemoteState, now};

/// Concurrency-safe map from remote part name to its latest state.
///
/// Each operation holds the lock for one map access only.
#[derive(Default)]
pub struct StateCache {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, RemoteEntry>,
    revision: u64,
}

impl StateCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<RemoteEntry> {
        self.read().entries.get(name).cloned()
    }

    /// Overwrite the state of `part` and return the stored entry.
    pub fn set(&self, part: &Part, state: RemoteState, confirmation: Confirmation) -> RemoteEntry {
        let mut inner = self.write();
        Self::insert(&mut inner, part, state, confirmation)
    }

    /// Like [`Self::set`], but only while `current()` holds. The check runs
    /// under the cache lock, so it cannot interleave with [`Self::remove`].
    pub fn set_if(
        &self,
        part: &Part,
        state: RemoteState,
        confirmation: Confirmation,
        current: impl FnOnce() -> bool,
    ) -> Option<RemoteEntry> {
        let mut inner = self.write();
        current().then(|| Self::insert(&mut inner, part, state, confirmation))
    }

    fn insert(
        inner: &mut Inner,
        part: &Part,
        state: RemoteState,
        confirmation: Confirmation,
    ) -> RemoteEntry {
        inner.revision += 1;
        let entry = RemoteEntry {
            part: part.clone(),
            state,
            confirmation,
            last_updated: now(),
            revision: inner.revision,
        };
        inner.entries.insert(part.name.clone(), entry.clone());
        entry
    }

    /// Settle the confirmation of the write made at `revision`.
    ///
    /// Returns `None` without touching the cache when a newer write has
    /// superseded it.
    pub fn confirm(
        &self,
        name: &str,
        revision: u64,
        confirmation: Confirmation,
    ) -> Option<RemoteEntry> {
        let mut inner = self.write();
        let entry = inner
            .entries
            .get_mut(name)
            .filter(|entry| entry.revision == revision)?;
        entry.confirmation = confirmation;
        Some(entry.clone())
    }

    /// Undo the write made at `revision`, putting `previous` back (or
    /// removing the entry when there was none).
    ///
    /// Returns `false` when a newer write has superseded it.
    pub fn restore(&self, name: &str, revision: u64, previous: Option<RemoteEntry>) -> bool {
        let mut inner = self.write();
        if inner.entries.get(name).map(|entry| entry.revision) != Some(revision) {
            return false;
        }
        match previous {
            Some(entry) => inner.entries.insert(name.to_string(), entry),
            None => inner.entries.remove(name),
        };
        true
    }

    pub fn remove(&self, name: &str) -> Option<RemoteEntry> {
        self.write().entries.remove(name)
    }

    /// All entries, ordered by part id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<RemoteEntry> {
        let mut entries: Vec<RemoteEntry> = self.read().entries.values().cloned().collect();
        entries.sort_by_key(|entry| entry.part.id);
        entries
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
