//! Pin actuation port.

/// Drives a local GPIO pin.
///
/// Toggling is fire-and-forget: nothing in panelhub depends on its outcome,
/// so implementations log failures instead of returning them.
pub trait PinActuator: Send + Sync {
    fn toggle(&self, pin: u32);
}

impl<T: PinActuator> PinActuator for std::sync::Arc<T> {
    fn toggle(&self, pin: u32) {
        (**self).toggle(pin);
    }
}
