//! Logging pin actuator — stands in for GPIO on hosts without one.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use panelhub_app::ports::PinActuator;

/// Records pin levels in memory and logs every toggle.
#[derive(Default)]
pub struct LoggingPinActuator {
    levels: Mutex<HashMap<u32, bool>>,
}

impl LoggingPinActuator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current level of `pin`; pins never toggled are low.
    #[must_use]
    pub fn level(&self, pin: u32) -> bool {
        self.levels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&pin)
            .copied()
            .unwrap_or(false)
    }
}

impl PinActuator for LoggingPinActuator {
    fn toggle(&self, pin: u32) {
        let mut levels = self.levels.lock().unwrap_or_else(PoisonError::into_inner);
        let level = levels.entry(pin).or_insert(false);
        *level = !*level;
        tracing::info!(pin, high = *level, "pin toggled");
    }
}
