//! Virtual remote switch — follows the commands published on its topic.

use std::sync::{Arc, Mutex, PoisonError};

use panelhub_app::ports::InboundHandler;
use panelhub_domain::payload::BinaryTokens;

use crate::broker::LoopbackBroker;

/// A simulated remote binary part. It decodes every command published on
/// its topic and remembers the last one.
pub struct VirtualSwitch {
    tokens: BinaryTokens,
    state: Mutex<bool>,
}

impl VirtualSwitch {
    /// Create a switch and attach it to `topic` on `broker`.
    pub fn attach(broker: &LoopbackBroker, topic: &str, tokens: BinaryTokens) -> Arc<Self> {
        let switch = Arc::new(Self {
            tokens,
            state: Mutex::new(false),
        });
        broker.attach_device(topic, Arc::clone(&switch) as Arc<dyn InboundHandler>);
        switch
    }

    #[must_use]
    pub fn is_on(&self) -> bool {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InboundHandler for VirtualSwitch {
    fn on_message(&self, topic: &str, payload: &[u8]) {
        match self.tokens.decode(payload) {
            Some(on) => {
                *self.state.lock().unwrap_or_else(PoisonError::into_inner) = on;
                tracing::info!(%topic, on, "virtual switch set");
            }
            None => tracing::warn!(%topic, "virtual switch ignored unknown command"),
        }
    }
}
