//! # panelhub-adapter-virtual
//!
//! Virtual/demo adapter that lets panelhub run without a broker or GPIO
//! hardware.
//!
//! ## Provided pieces
//!
//! | Piece | Port | Behaviour |
//! |-------|------|-----------|
//! | [`LoopbackBroker`] | `PubSubTransport` | In-process topic routing, immediate acks |
//! | [`VirtualSensor`] | — | Publishes a drifting reading on its topic every tick |
//! | [`VirtualSwitch`] | — | Follows the binary commands published on its topic |
//! | [`LoggingPinActuator`] | `PinActuator` | Logs toggles, remembers pin levels |
//!
//! ## Dependency rule
//!
//! Depends on `panelhub-app` (port traits) and `panelhub-domain` only.

mod actuator;
mod broker;
mod devices;

pub use actuator::LoggingPinActuator;
pub use broker::LoopbackBroker;
pub use devices::{VirtualSensor, VirtualSwitch};
