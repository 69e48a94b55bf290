//! Part — an addressable actuator or sensor.
//!
//! A part is either wired to this host (local, with a GPIO pin) or reached
//! over the telemetry network (remote, addressed by topic). It carries
//! either a binary (`on`) or an analog (`value`) state.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::PartId;

/// Whether a part carries an on/off state or a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Binary,
    Analog,
}

/// The four catalog categories. Names are unique within a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    LocalBinary,
    LocalAnalog,
    RemoteBinary,
    RemoteAnalog,
}

impl Category {
    #[must_use]
    pub fn is_remote(self) -> bool {
        matches!(self, Self::RemoteBinary | Self::RemoteAnalog)
    }

    #[must_use]
    pub fn signal(self) -> SignalKind {
        match self {
            Self::LocalBinary | Self::RemoteBinary => SignalKind::Binary,
            Self::LocalAnalog | Self::RemoteAnalog => SignalKind::Analog,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocalBinary => f.write_str("local binary"),
            Self::LocalAnalog => f.write_str("local analog"),
            Self::RemoteBinary => f.write_str("remote binary"),
            Self::RemoteAnalog => f.write_str("remote analog"),
        }
    }
}

/// Identity of a part. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub id: PartId,
    pub name: String,
    /// GPIO pin; only meaningful for local parts.
    pub pin: Option<u32>,
}

impl Part {
    /// Start building a part.
    #[must_use]
    pub fn builder() -> PartBuilder {
        PartBuilder::default()
    }

    /// Check the invariants that depend on the part's category.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the name is unusable as a topic
    /// segment or a local part has no pin.
    pub fn validate(&self, category: Category) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        if !category.is_remote() && self.pin.is_none() {
            return Err(ValidationError::MissingPin);
        }
        Ok(())
    }
}

/// Builder for [`Part`].
#[derive(Debug, Default)]
pub struct PartBuilder {
    id: PartId,
    name: Option<String>,
    pin: Option<u32>,
}

impl PartBuilder {
    #[must_use]
    pub fn id(mut self, id: PartId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn pin(mut self, pin: u32) -> Self {
        self.pin = Some(pin);
        self
    }

    /// Build the part, validating the name.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] or
    /// [`ValidationError::InvalidName`].
    pub fn build(self) -> Result<Part, ValidationError> {
        let name = self.name.ok_or(ValidationError::EmptyName)?;
        validate_name(&name)?;
        Ok(Part {
            id: self.id,
            name,
            pin: self.pin,
        })
    }
}

/// Part names double as topic segments and URL path segments.
fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '+' | '#'))
    {
        return Err(ValidationError::InvalidName);
    }
    Ok(())
}

/// State of a local binary part.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryState {
    pub on: bool,
}

/// State of a local analog part.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalogState {
    pub value: f64,
}

/// A part together with its state, serialized flat as `{id, name, pin, ...state}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartView<S> {
    #[serde(flatten)]
    pub part: Part,
    #[serde(flatten)]
    pub state: S,
}
