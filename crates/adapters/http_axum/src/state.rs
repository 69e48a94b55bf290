//! Shared application state for axum handlers.

use std::sync::Arc;

use panelhub_app::ports::{PinActuator, PubSubTransport};
use panelhub_app::services::local_parts::LocalPartService;
use panelhub_app::services::remote_bridge::RemoteBridge;

/// Application state shared across all axum handlers.
///
/// Generic over the transport and the pin actuator to avoid dynamic
/// dispatch. `Clone` is implemented manually so the underlying types
/// themselves do not need to be `Clone`; only the `Arc` wrappers are cloned.
pub struct AppState<T: PubSubTransport + 'static, A> {
    /// Remote parts: reads, writes, cache and live observer.
    pub bridge: Arc<RemoteBridge<T>>,
    /// Local parts wired to this host.
    pub local_parts: Arc<LocalPartService<A>>,
}

impl<T: PubSubTransport + 'static, A> Clone for AppState<T, A> {
    fn clone(&self) -> Self {
        Self {
            bridge: Arc::clone(&self.bridge),
            local_parts: Arc::clone(&self.local_parts),
        }
    }
}

impl<T, A> AppState<T, A>
where
    T: PubSubTransport + 'static,
    A: PinActuator + 'static,
{
    /// Create a new application state from service instances.
    pub fn new(bridge: RemoteBridge<T>, local_parts: LocalPartService<A>) -> Self {
        Self::from_arcs(Arc::new(bridge), Arc::new(local_parts))
    }

    /// Create a new application state from pre-wrapped `Arc` services.
    ///
    /// Use this when the bridge must also be reachable from background
    /// tasks, e.g. to tear it down on shutdown.
    pub fn from_arcs(bridge: Arc<RemoteBridge<T>>, local_parts: Arc<LocalPartService<A>>) -> Self {
        Self {
            bridge,
            local_parts,
        }
    }
}
