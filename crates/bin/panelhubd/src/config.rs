//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `panelhub.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use panelhub_adapter_mqtt::MqttConfig;
use panelhub_app::services::remote_bridge::BridgeSettings;
use panelhub_domain::error::ValidationError;
use panelhub_domain::id::PartId;
use panelhub_domain::payload::BinaryTokens;
use panelhub_domain::topic::TopicMapper;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Feature toggles.
    pub features: FeaturesConfig,
    /// Remote bridge tunables.
    pub bridge: BridgeConfig,
    /// Broker connection, used when `features.transport = "mqtt"`.
    pub mqtt: MqttConfig,
    /// Parts registered at startup.
    pub parts: PartsConfig,
    /// Simulated devices, used when `features.transport = "loopback"`.
    pub simulation: SimulationConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Which publish/subscribe transport reaches the remote parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// A real MQTT broker.
    Mqtt,
    /// The in-process broker with simulated devices.
    Loopback,
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "mqtt" => Ok(Self::Mqtt),
            "loopback" => Ok(Self::Loopback),
            other => Err(ConfigError::Validation(format!(
                "unknown transport {other:?}, expected \"mqtt\" or \"loopback\""
            ))),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mqtt => f.write_str("mqtt"),
            Self::Loopback => f.write_str("loopback"),
        }
    }
}

/// Feature toggles.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Drive pins when local binary parts are toggled.
    pub gpio: bool,
    /// Mount the `/live` WebSocket.
    pub live_observer: bool,
    pub transport: TransportKind,
}

/// Remote bridge tunables.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Remote part `NAME` lives on topic `{topic_prefix}/NAME`.
    pub topic_prefix: String,
    /// Default bound of a remote read, in milliseconds.
    pub read_timeout_ms: u64,
    /// Largest read bound a client may ask for, in milliseconds.
    pub max_read_timeout_ms: u64,
    /// Bound of a publish acknowledgement, a subscribe or an unsubscribe,
    /// in milliseconds.
    pub ack_timeout_ms: u64,
    /// Payload meaning "on".
    pub on_token: String,
    /// Payload meaning "off".
    pub off_token: String,
    /// Undelivered messages kept for the live observer.
    pub observer_buffer: usize,
}

impl BridgeConfig {
    /// Build the bridge settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic prefix or the payload tokens are
    /// unusable, a timeout is zero, or the default read timeout exceeds
    /// the maximum.
    pub fn settings(&self) -> Result<BridgeSettings, ConfigError> {
        if self.read_timeout_ms == 0 || self.ack_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "bridge timeouts must be non-zero".to_string(),
            ));
        }
        if self.read_timeout_ms > self.max_read_timeout_ms {
            return Err(ConfigError::Validation(
                "read timeout must not exceed the maximum read timeout".to_string(),
            ));
        }
        Ok(BridgeSettings {
            topics: TopicMapper::new(self.topic_prefix.clone())?,
            tokens: BinaryTokens::new(self.on_token.clone(), self.off_token.clone())?,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            max_read_timeout: Duration::from_millis(self.max_read_timeout_ms),
            ack_timeout: Duration::from_millis(self.ack_timeout_ms),
            observer_buffer: self.observer_buffer,
        })
    }
}

/// A local part registered at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalPartSeed {
    #[serde(default)]
    pub id: Option<PartId>,
    pub name: String,
    pub pin: u32,
}

/// A remote part registered at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct RemotePartSeed {
    #[serde(default)]
    pub id: Option<PartId>,
    pub name: String,
}

/// Catalog registered at startup.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PartsConfig {
    pub local_binary: Vec<LocalPartSeed>,
    pub local_analog: Vec<LocalPartSeed>,
    pub remote_binary: Vec<RemotePartSeed>,
    pub remote_analog: Vec<RemotePartSeed>,
}

/// A simulated sensor reporting on a remote analog part's topic.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorSeed {
    pub part: String,
    /// Reading around which the sensor drifts.
    pub base: f64,
}

/// Simulated devices behind the loopback transport.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Pause between two sensor readings, in milliseconds.
    pub interval_ms: u64,
    pub sensors: Vec<SensorSeed>,
    /// Remote binary parts answered by a simulated switch.
    pub switches: Vec<String>,
}

impl SimulationConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Config {
    /// Load configuration from `panelhub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("panelhub.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = var("PANELHUB_HOST") {
            self.server.host = val;
        }
        if let Some(port) = var("PANELHUB_PORT").and_then(|val| val.parse().ok()) {
            self.server.port = port;
        }
        if let Some(val) = var("PANELHUB_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Some(val) = var("PANELHUB_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("PANELHUB_TRANSPORT") {
            self.features.transport = val.parse()?;
        }
        if let Some(val) = var("PANELHUB_MQTT_HOST") {
            self.mqtt.broker_host = val;
        }
        if let Some(val) = var("PANELHUB_MQTT_PASSWORD") {
            self.mqtt.password = Some(val);
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        self.bridge.settings()?;
        self.mqtt
            .qos()
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        if self.features.transport == TransportKind::Loopback && self.simulation.interval_ms == 0 {
            return Err(ConfigError::Validation(
                "simulation interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "panelhubd=info,panelhub=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            gpio: false,
            live_observer: true,
            transport: TransportKind::Loopback,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let defaults = BridgeSettings::default();
        Self {
            topic_prefix: defaults.topics.prefix().to_string(),
            read_timeout_ms: 5000,
            max_read_timeout_ms: 30_000,
            ack_timeout_ms: 3000,
            on_token: defaults.tokens.encode(true).to_string(),
            off_token: defaults.tokens.encode(false).to_string(),
            observer_buffer: defaults.observer_buffer,
        }
    }
}

fn local(id: u32, name: &str, pin: u32) -> LocalPartSeed {
    LocalPartSeed {
        id: Some(PartId::new(id)),
        name: name.to_string(),
        pin,
    }
}

fn remote(id: u32, name: &str) -> RemotePartSeed {
    RemotePartSeed {
        id: Some(PartId::new(id)),
        name: name.to_string(),
    }
}

impl Default for PartsConfig {
    fn default() -> Self {
        Self {
            local_binary: vec![local(0, "LED1", 0), local(1, "LED2", 1)],
            local_analog: vec![local(2, "TEMP1", 2), local(3, "TEMP2", 3)],
            remote_binary: vec![remote(4, "LED5")],
            remote_analog: vec![remote(5, "TEMP5")],
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            sensors: vec![SensorSeed {
                part: "TEMP5".to_string(),
                base: 21.0,
            }],
            switches: vec!["LED5".to_string()],
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// A value breaks a domain rule.
    #[error("invalid configuration")]
    Domain(#[from] ValidationError),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, val)| ((*key).to_string(), (*val).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.features.transport, TransportKind::Loopback);
        assert!(config.features.live_observer);
        assert!(!config.features.gpio);
        assert_eq!(config.bridge.topic_prefix, "topic");
        assert_eq!(config.bridge.on_token, "TRUE");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_seed_default_catalog() {
        let parts = PartsConfig::default();
        let names: Vec<&str> = parts
            .local_binary
            .iter()
            .chain(&parts.local_analog)
            .map(|seed| seed.name.as_str())
            .collect();
        assert_eq!(names, ["LED1", "LED2", "TEMP1", "TEMP2"]);
        assert_eq!(parts.remote_binary[0].name, "LED5");
        assert_eq!(parts.remote_analog[0].id, Some(PartId::new(5)));
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.parts.remote_binary.len(), 1);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [server]
            host = '127.0.0.1'
            port = 9090

            [logging]
            filter = 'debug'

            [features]
            gpio = true
            live_observer = false
            transport = 'mqtt'

            [bridge]
            topic_prefix = 'panel'
            read_timeout_ms = 1500
            on_token = 'ON'
            off_token = 'OFF'

            [mqtt]
            broker_host = 'broker.local'
            qos = 1

            [[parts.remote_analog]]
            name = 'HUM3'

            [simulation]
            interval_ms = 500
            switches = []
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.logging.filter, "debug");
        assert!(config.features.gpio);
        assert!(!config.features.live_observer);
        assert_eq!(config.features.transport, TransportKind::Mqtt);
        assert_eq!(config.mqtt.broker_host, "broker.local");
        assert_eq!(config.mqtt.broker_port, 1883);
        assert_eq!(config.parts.remote_analog[0].name, "HUM3");
        assert_eq!(config.parts.remote_analog[0].id, None);
        assert_eq!(config.parts.local_binary.len(), 2);
        assert!(config.simulation.switches.is_empty());

        let settings = config.bridge.settings().unwrap();
        assert_eq!(settings.topics.topic_for("HUM3"), "panel/HUM3");
        assert_eq!(settings.read_timeout, Duration::from_millis(1500));
        assert_eq!(settings.max_read_timeout, Duration::from_secs(30));
        assert_eq!(settings.ack_timeout, Duration::from_secs(3));
        assert_eq!(settings.tokens.encode(false), "OFF");
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn should_apply_environment_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(overrides(&[
                ("PANELHUB_BIND", "127.0.0.1:9000"),
                ("PANELHUB_LOG", "warn"),
                ("RUST_LOG", "trace"),
                ("PANELHUB_TRANSPORT", "MQTT"),
                ("PANELHUB_MQTT_HOST", "10.0.0.2"),
                ("PANELHUB_MQTT_PASSWORD", "hunter2"),
            ]))
            .unwrap();

        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
        assert_eq!(config.logging.filter, "trace");
        assert_eq!(config.features.transport, TransportKind::Mqtt);
        assert_eq!(config.mqtt.broker_host, "10.0.0.2");
        assert_eq!(config.mqtt.password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn should_ignore_unparsable_port_override() {
        let mut config = Config::default();
        config
            .apply_overrides(overrides(&[("PANELHUB_PORT", "eighty")]))
            .unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn should_reject_unknown_transport_override() {
        let mut config = Config::default();
        let result = config.apply_overrides(overrides(&[("PANELHUB_TRANSPORT", "carrier-pigeon")]));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_reject_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_unusable_bridge_settings() {
        let mut config = Config::default();
        config.bridge.off_token = "TRUE".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Domain(_))));

        let mut config = Config::default();
        config.bridge.ack_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = Config::default();
        config.bridge.read_timeout_ms = 60_000;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = Config::default();
        config.bridge.topic_prefix = "panel/#".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Domain(ValidationError::InvalidTopicPrefix))
        ));
    }

    #[test]
    fn should_reject_invalid_qos() {
        let mut config = Config::default();
        config.mqtt.qos = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_format_bind_addr() {
        let config = Config::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }
}
