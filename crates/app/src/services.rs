//! Application services.
//!
//! Shared state (registry, cache, observer) is held behind `Arc` handles
//! and passed explicitly; services that talk to the outside world take
//! their port implementations as generic parameters.

pub mod correlator;
pub mod live_observer;
pub mod local_parts;
pub mod part_registry;
pub mod publish_gateway;
pub mod remote_bridge;
pub mod state_cache;

#[cfg(test)]
pub(crate) mod testing;
