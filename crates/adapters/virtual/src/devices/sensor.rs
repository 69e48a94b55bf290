//! Virtual remote sensor — periodically reports a drifting reading.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::broker::LoopbackBroker;

/// A simulated remote analog sensor publishing on its topic.
#[derive(Debug, Clone)]
pub struct VirtualSensor {
    topic: String,
    base: f64,
    amplitude: f64,
}

impl VirtualSensor {
    #[must_use]
    pub fn new(topic: impl Into<String>, base: f64) -> Self {
        Self {
            topic: topic.into(),
            base,
            amplitude: 1.5,
        }
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The reading reported at tick `step`, formatted like device firmware
    /// would (one decimal).
    #[must_use]
    pub fn reading(&self, step: u32) -> String {
        let value = self.base + self.amplitude * (f64::from(step) * 0.4).sin();
        format!("{value:.1}")
    }

    /// Report a reading every `interval` until the task is aborted.
    pub fn spawn(self, broker: Arc<LoopbackBroker>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut step: u32 = 0;
            loop {
                ticker.tick().await;
                let reading = self.reading(step);
                let delivered = broker.inject(&self.topic, reading.as_bytes());
                tracing::trace!(topic = %self.topic, %reading, delivered, "virtual sensor tick");
                step = step.wrapping_add(1);
            }
        })
    }
}
