//! # panelhubd — panelhub daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Initialize `tracing` from the configured filter
//! - Construct the selected transport: an MQTT client and its event loop,
//!   or the in-process loopback broker with simulated devices
//! - Construct application services and seed the part catalog
//! - Build the axum router, injecting application services
//! - Bind to a TCP port and serve until Ctrl-C
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use panelhub_adapter_http_axum::router;
use panelhub_adapter_mqtt::MqttTransport;
use panelhub_adapter_virtual::{LoggingPinActuator, LoopbackBroker};
use panelhub_app::ports::PubSubTransport;
use panelhubd::config::{Config, TransportKind};
use panelhubd::wiring;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    init_tracing(&config.logging.filter);
    tracing::info!(
        transport = %config.features.transport,
        gpio = config.features.gpio,
        live_observer = config.features.live_observer,
        "starting panelhubd"
    );

    match config.features.transport {
        TransportKind::Mqtt => {
            let (transport, event_loop) =
                MqttTransport::new(&config.mqtt).context("failed to create MQTT client")?;
            tracing::info!(
                broker = %format!("{}:{}", config.mqtt.broker_host, config.mqtt.broker_port),
                "connecting to MQTT broker"
            );
            let events = tokio::spawn(event_loop.run());
            let result = serve(&config, Arc::new(transport)).await;
            events.abort();
            result
        }
        TransportKind::Loopback => {
            let broker = Arc::new(LoopbackBroker::new());
            let settings = config.bridge.settings()?;
            let simulation = wiring::simulate(&config.simulation, &settings, &broker);
            let result = serve(&config, broker).await;
            simulation.stop();
            result
        }
    }
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn serve<T: PubSubTransport + 'static>(
    config: &Config,
    transport: Arc<T>,
) -> anyhow::Result<()> {
    let actuator = config.features.gpio.then(LoggingPinActuator::new);
    let state = wiring::assemble(
        &config.parts,
        config.bridge.settings()?,
        transport,
        actuator,
    )
    .context("failed to seed the part catalog")?;
    let app = router::build(state, config.features.live_observer);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(%bind_addr, "panelhubd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server shutdown with error")?;

    tracing::info!("graceful shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
