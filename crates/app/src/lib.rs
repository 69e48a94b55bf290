//! # panelhub-app
//!
//! Application layer — services and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters implement:
//!   - `PubSubTransport` — publish / subscribe / unsubscribe on topics
//!   - `InboundHandler` — receives messages for one subscribed topic
//!   - `PinActuator` — fire-and-forget GPIO toggling
//! - Provide the **remote telemetry bridge**:
//!   - `PartRegistry` — in-memory catalog of local and remote parts
//!   - `StateCache` — last known state per remote part
//!   - `LiveObserver` — fan-out to the single real-time observer
//!   - `PublishGateway` — bounded-ack publishing with optimistic state
//!   - `SubscriptionCorrelator` — request/response on top of pub/sub
//!   - `RemoteBridge` — facade wiring the above together
//! - Provide `LocalPartService` for directly wired parts
//!
//! ## Dependency rule
//! Depends on `panelhub-domain` only (plus `tokio` for channels and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod ports;
pub mod services;
