//! Service assembly — seeds the catalog and builds the HTTP state for a
//! given transport.

use std::sync::Arc;

use tokio::task::JoinHandle;

use panelhub_adapter_http_axum::state::AppState;
use panelhub_adapter_virtual::{LoopbackBroker, VirtualSensor, VirtualSwitch};
use panelhub_app::ports::{PinActuator, PubSubTransport};
use panelhub_app::services::local_parts::{LocalPartService, NewLocalPart};
use panelhub_app::services::part_registry::PartRegistry;
use panelhub_app::services::remote_bridge::{BridgeSettings, RemoteBridge};
use panelhub_domain::error::PanelHubError;
use panelhub_domain::part::SignalKind;

use crate::config::{LocalPartSeed, PartsConfig, SimulationConfig};

fn new_local(seed: &LocalPartSeed) -> NewLocalPart {
    NewLocalPart {
        id: seed.id,
        name: seed.name.clone(),
        pin: Some(seed.pin),
    }
}

/// Build the services over `transport` and register the seeded parts.
///
/// # Errors
///
/// Returns the registry error of the first seed that cannot be registered.
pub fn assemble<T, A>(
    parts: &PartsConfig,
    settings: BridgeSettings,
    transport: Arc<T>,
    actuator: Option<A>,
) -> Result<AppState<T, A>, PanelHubError>
where
    T: PubSubTransport + 'static,
    A: PinActuator + 'static,
{
    let registry = Arc::new(PartRegistry::new());

    let local_parts = LocalPartService::new(Arc::clone(&registry), actuator);
    for seed in &parts.local_binary {
        local_parts.add_binary(new_local(seed))?;
    }
    for seed in &parts.local_analog {
        local_parts.add_analog(new_local(seed))?;
    }

    let bridge = RemoteBridge::new(transport, registry, settings);
    for seed in &parts.remote_binary {
        bridge.register(seed.id, seed.name.clone(), SignalKind::Binary)?;
    }
    for seed in &parts.remote_analog {
        bridge.register(seed.id, seed.name.clone(), SignalKind::Analog)?;
    }

    tracing::info!(
        local_binary = parts.local_binary.len(),
        local_analog = parts.local_analog.len(),
        remote = parts.remote_binary.len() + parts.remote_analog.len(),
        "catalog seeded"
    );
    Ok(AppState::new(bridge, local_parts))
}

/// Simulated devices running behind a [`LoopbackBroker`].
pub struct Simulation {
    pub switches: Vec<Arc<VirtualSwitch>>,
    sensors: Vec<JoinHandle<()>>,
}

impl Simulation {
    /// Stop reporting sensor readings.
    pub fn stop(self) {
        for sensor in self.sensors {
            sensor.abort();
        }
    }
}

/// Attach the simulated switches to `broker` and start the simulated
/// sensors.
pub fn simulate(
    simulation: &SimulationConfig,
    settings: &BridgeSettings,
    broker: &Arc<LoopbackBroker>,
) -> Simulation {
    let switches = simulation
        .switches
        .iter()
        .map(|part| {
            let topic = settings.topics.topic_for(part);
            tracing::info!(%topic, "simulated switch attached");
            VirtualSwitch::attach(broker, &topic, settings.tokens.clone())
        })
        .collect();

    let sensors = simulation
        .sensors
        .iter()
        .map(|seed| {
            let topic = settings.topics.topic_for(&seed.part);
            tracing::info!(%topic, base = seed.base, "simulated sensor started");
            VirtualSensor::new(topic, seed.base).spawn(Arc::clone(broker), simulation.interval())
        })
        .collect();

    Simulation { switches, sensors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, RemotePartSeed};
    use panelhub_adapter_virtual::LoggingPinActuator;

    #[test]
    fn should_register_default_catalog() {
        let config = Config::default();
        let state = assemble(
            &config.parts,
            config.bridge.settings().unwrap(),
            Arc::new(LoopbackBroker::new()),
            None::<LoggingPinActuator>,
        )
        .unwrap();

        let binary = state.local_parts.binary_parts();
        assert_eq!(binary.len(), 2);
        assert_eq!(binary[1].part.pin, Some(1));
        assert_eq!(state.local_parts.analog_parts().len(), 2);

        let remote: Vec<String> = state
            .bridge
            .remote_parts()
            .into_iter()
            .map(|status| status.part.name)
            .collect();
        assert_eq!(remote, ["LED5", "TEMP5"]);
    }

    #[test]
    fn should_reject_duplicate_seed() {
        let mut parts = PartsConfig::default();
        parts.remote_analog.push(RemotePartSeed {
            id: None,
            name: "LED5".to_string(),
        });

        let result = assemble(
            &parts,
            BridgeSettings::default(),
            Arc::new(LoopbackBroker::new()),
            None::<LoggingPinActuator>,
        );
        assert!(matches!(result, Err(PanelHubError::Conflict(_))));
    }

    #[tokio::test]
    async fn should_attach_simulated_switch() {
        let config = Config::default();
        let settings = config.bridge.settings().unwrap();
        let broker = Arc::new(LoopbackBroker::new());

        let simulation = simulate(&config.simulation, &settings, &broker);
        assert_eq!(simulation.switches.len(), 1);

        broker
            .publish("topic/LED5", b"TRUE".to_vec())
            .await
            .unwrap();
        assert!(simulation.switches[0].is_on());
        simulation.stop();
    }
}
