//! Local part service — use-cases for directly wired parts.

use std::sync::Arc;

use panelhub_domain::error::PanelHubError;
use panelhub_domain::id::PartId;
use panelhub_domain::part::{AnalogState, BinaryState, Category, PartView};

use crate::ports::PinActuator;
use crate::services::part_registry::{NewPart, PartRegistry};

/// Input for adding a local part.
#[derive(Debug, Clone)]
pub struct NewLocalPart {
    pub id: Option<PartId>,
    pub name: String,
    pub pin: Option<u32>,
}

/// Lists, adds and toggles local parts. Pins are only driven when an
/// actuator is configured.
pub struct LocalPartService<A> {
    registry: Arc<PartRegistry>,
    actuator: Option<A>,
}

impl<A: PinActuator> LocalPartService<A> {
    pub fn new(registry: Arc<PartRegistry>, actuator: Option<A>) -> Self {
        Self { registry, actuator }
    }

    #[must_use]
    pub fn binary_parts(&self) -> Vec<PartView<BinaryState>> {
        self.registry.binary_parts()
    }

    /// # Errors
    ///
    /// Returns [`PanelHubError::UnknownPart`] when no such part exists.
    pub fn binary_part(&self, name: &str) -> Result<PartView<BinaryState>, PanelHubError> {
        self.registry.binary_part(name)
    }

    /// # Errors
    ///
    /// Returns a validation or conflict error from the registry.
    pub fn add_binary(&self, new: NewLocalPart) -> Result<PartView<BinaryState>, PanelHubError> {
        let part = self.registry.register(NewPart {
            id: new.id,
            name: new.name,
            pin: new.pin,
            category: Category::LocalBinary,
        })?;
        Ok(PartView {
            part,
            state: BinaryState::default(),
        })
    }

    /// Flip a local binary part, then drive its pin.
    ///
    /// # Errors
    ///
    /// Returns [`PanelHubError::UnknownPart`] when no such part exists.
    pub fn toggle(&self, name: &str) -> Result<PartView<BinaryState>, PanelHubError> {
        let view = self.registry.toggle_binary(name)?;
        match (&self.actuator, view.part.pin) {
            (Some(actuator), Some(pin)) => actuator.toggle(pin),
            _ => tracing::debug!(part = %view.part.name, "gpio disabled, pin not driven"),
        }
        Ok(view)
    }

    #[must_use]
    pub fn analog_parts(&self) -> Vec<PartView<AnalogState>> {
        self.registry.analog_parts()
    }

    /// # Errors
    ///
    /// Returns [`PanelHubError::UnknownPart`] when no such part exists.
    pub fn analog_part(&self, name: &str) -> Result<PartView<AnalogState>, PanelHubError> {
        self.registry.analog_part(name)
    }

    /// # Errors
    ///
    /// Returns a validation or conflict error from the registry.
    pub fn add_analog(&self, new: NewLocalPart) -> Result<PartView<AnalogState>, PanelHubError> {
        let part = self.registry.register(NewPart {
            id: new.id,
            name: new.name,
            pin: new.pin,
            category: Category::LocalAnalog,
        })?;
        Ok(PartView {
            part,
            state: AnalogState::default(),
        })
    }
}
