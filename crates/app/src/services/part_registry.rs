//! Part registry — in-memory catalog of known parts.

use std::sync::{PoisonError, RwLock};

use panelhub_domain::error::PanelHubError;
use panelhub_domain::id::PartId;
use panelhub_domain::part::{AnalogState, BinaryState, Category, Part, PartView, SignalKind};

/// Input for [`PartRegistry::register`].
#[derive(Debug, Clone)]
pub struct NewPart {
    /// Explicit id; the next free one is assigned when absent.
    pub id: Option<PartId>,
    pub name: String,
    pub pin: Option<u32>,
    pub category: Category,
}

/// A registered remote part and the kind of state it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePart {
    pub part: Part,
    pub kind: SignalKind,
}

#[derive(Default)]
struct Catalog {
    binary: Vec<PartView<BinaryState>>,
    analog: Vec<PartView<AnalogState>>,
    remote: Vec<RemotePart>,
    next_id: PartId,
}

impl Catalog {
    fn id_in_use(&self, id: PartId) -> bool {
        self.binary.iter().any(|view| view.part.id == id)
            || self.analog.iter().any(|view| view.part.id == id)
            || self.remote.iter().any(|remote| remote.part.id == id)
    }

    /// The first unused id from `next_id` upwards, wrapping around once.
    fn free_id(&self) -> Option<PartId> {
        let start = self.next_id.get();
        (start..=u32::MAX)
            .chain(0..start)
            .map(PartId::new)
            .find(|id| !self.id_in_use(*id))
    }

    fn name_in_use(&self, name: &str, category: Category) -> bool {
        match category {
            Category::LocalBinary => self.binary.iter().any(|view| view.part.name == name),
            Category::LocalAnalog => self.analog.iter().any(|view| view.part.name == name),
            // Both remote categories share one topic namespace.
            Category::RemoteBinary | Category::RemoteAnalog => {
                self.remote.iter().any(|remote| remote.part.name == name)
            }
        }
    }
}

/// Process-wide catalog of local and remote parts.
///
/// Every access takes the lock for a single catalog operation; the lock
/// is never held across an `.await`.
#[derive(Default)]
pub struct PartRegistry {
    catalog: RwLock<Catalog>,
}

impl PartRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a part to the catalog. Local parts start off / at `0.0`.
    ///
    /// # Errors
    ///
    /// Returns [`PanelHubError::Validation`] when the part breaks a domain
    /// invariant, or [`PanelHubError::Conflict`] when the name (or explicit
    /// id) is already taken.
    pub fn register(&self, new: NewPart) -> Result<Part, PanelHubError> {
        let mut catalog = self.catalog.write().unwrap_or_else(PoisonError::into_inner);

        let id = match new.id {
            Some(id) if catalog.id_in_use(id) => {
                return Err(PanelHubError::Conflict(format!("id {id}")));
            }
            Some(id) => id,
            None => catalog
                .free_id()
                .ok_or_else(|| PanelHubError::Conflict("no free part id".to_string()))?,
        };

        let mut builder = Part::builder().id(id).name(new.name);
        if let Some(pin) = new.pin.filter(|_| !new.category.is_remote()) {
            builder = builder.pin(pin);
        }
        let part = builder.build()?;
        part.validate(new.category)?;

        if catalog.name_in_use(&part.name, new.category) {
            return Err(PanelHubError::Conflict(part.name));
        }

        match new.category {
            Category::LocalBinary => catalog.binary.push(PartView {
                part: part.clone(),
                state: BinaryState::default(),
            }),
            Category::LocalAnalog => catalog.analog.push(PartView {
                part: part.clone(),
                state: AnalogState::default(),
            }),
            Category::RemoteBinary | Category::RemoteAnalog => catalog.remote.push(RemotePart {
                part: part.clone(),
                kind: new.category.signal(),
            }),
        }
        if id >= catalog.next_id {
            catalog.next_id = id.next().unwrap_or_default();
        }

        tracing::debug!(
            part = %part.name,
            id = %part.id,
            category = %new.category,
            "part registered"
        );
        Ok(part)
    }

    #[must_use]
    pub fn binary_parts(&self) -> Vec<PartView<BinaryState>> {
        self.read().binary.clone()
    }

    /// Look up a local binary part.
    ///
    /// # Errors
    ///
    /// Returns [`PanelHubError::UnknownPart`] when no such part exists.
    pub fn binary_part(&self, name: &str) -> Result<PartView<BinaryState>, PanelHubError> {
        self.read()
            .binary
            .iter()
            .find(|view| view.part.name == name)
            .cloned()
            .ok_or_else(|| PanelHubError::UnknownPart(name.to_string()))
    }

    /// Flip a local binary part and return its new state.
    ///
    /// # Errors
    ///
    /// Returns [`PanelHubError::UnknownPart`] when no such part exists.
    pub fn toggle_binary(&self, name: &str) -> Result<PartView<BinaryState>, PanelHubError> {
        let mut catalog = self.catalog.write().unwrap_or_else(PoisonError::into_inner);
        let view = catalog
            .binary
            .iter_mut()
            .find(|view| view.part.name == name)
            .ok_or_else(|| PanelHubError::UnknownPart(name.to_string()))?;
        view.state.on = !view.state.on;
        Ok(view.clone())
    }

    #[must_use]
    pub fn analog_parts(&self) -> Vec<PartView<AnalogState>> {
        self.read().analog.clone()
    }

    /// Look up a local analog part.
    ///
    /// # Errors
    ///
    /// Returns [`PanelHubError::UnknownPart`] when no such part exists.
    pub fn analog_part(&self, name: &str) -> Result<PartView<AnalogState>, PanelHubError> {
        self.read()
            .analog
            .iter()
            .find(|view| view.part.name == name)
            .cloned()
            .ok_or_else(|| PanelHubError::UnknownPart(name.to_string()))
    }

    #[must_use]
    pub fn remote_parts(&self) -> Vec<RemotePart> {
        self.read().remote.clone()
    }

    /// Look up a remote part of either kind.
    ///
    /// # Errors
    ///
    /// Returns [`PanelHubError::UnknownPart`] when no such part exists.
    pub fn remote(&self, name: &str) -> Result<RemotePart, PanelHubError> {
        self.read()
            .remote
            .iter()
            .find(|remote| remote.part.name == name)
            .cloned()
            .ok_or_else(|| PanelHubError::UnknownPart(name.to_string()))
    }

    /// Look up a remote part that carries `kind` state.
    ///
    /// # Errors
    ///
    /// Returns [`PanelHubError::UnknownPart`] when no such part exists or it
    /// carries the other kind of state.
    pub fn remote_of(&self, name: &str, kind: SignalKind) -> Result<RemotePart, PanelHubError> {
        self.remote(name)
            .ok()
            .filter(|remote| remote.kind == kind)
            .ok_or_else(|| PanelHubError::UnknownPart(name.to_string()))
    }

    /// Remove a remote part from the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`PanelHubError::UnknownPart`] when no such part exists.
    pub fn remove_remote(&self, name: &str) -> Result<RemotePart, PanelHubError> {
        let mut catalog = self.catalog.write().unwrap_or_else(PoisonError::into_inner);
        let index = catalog
            .remote
            .iter()
            .position(|remote| remote.part.name == name)
            .ok_or_else(|| PanelHubError::UnknownPart(name.to_string()))?;
        Ok(catalog.remote.remove(index))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Catalog> {
        self.catalog.read().unwrap_or_else(PoisonError::into_inner)
    }
}
