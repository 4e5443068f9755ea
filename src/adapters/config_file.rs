//! JSON file configuration adapter.
//!
//! Implements [`ConfigPort`] over a single JSON document.  Every field is
//! range-checked after loading and before saving.

use std::fs;
use std::io;
use std::path::PathBuf;

use log::{info, warn};

use super::log_sink;
use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::{BridgeConfig, GpioBackend, TransportKind};

pub struct JsonFileConfig {
    path: PathBuf,
}

impl JsonFileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

pub fn validate_config(cfg: &BridgeConfig) -> Result<(), ConfigError> {
    if !(10..=1_000).contains(&cfg.poll_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "poll_interval_ms must be 10–1000",
        ));
    }
    if cfg.button_gpio == cfg.led_gpio
        || cfg.button_gpio == cfg.buzzer_gpio
        || cfg.led_gpio == cfg.buzzer_gpio
    {
        return Err(ConfigError::ValidationFailed(
            "button, LED and buzzer must use distinct GPIO lines",
        ));
    }
    if cfg.voice_client.trim().is_empty() {
        return Err(ConfigError::ValidationFailed("voice_client must not be empty"));
    }
    if cfg.namespace.is_empty() || cfg.publish_suffix.is_empty() || cfg.subscribe_suffix.is_empty()
    {
        return Err(ConfigError::ValidationFailed(
            "namespace and topic suffixes must not be empty",
        ));
    }
    if cfg.publish_suffix == cfg.subscribe_suffix {
        return Err(ConfigError::ValidationFailed(
            "publish_suffix must differ from subscribe_suffix",
        ));
    }
    if !(100..=60_000).contains(&cfg.terminate_timeout_ms) {
        return Err(ConfigError::ValidationFailed(
            "terminate_timeout_ms must be 100–60000",
        ));
    }
    let broker_unset =
        cfg.mqtt_host.trim().is_empty() || cfg.mqtt_port == 0 || cfg.mqtt_client_id.is_empty();
    if cfg.transport == TransportKind::Mqtt && broker_unset {
        return Err(ConfigError::ValidationFailed(
            "mqtt_host, mqtt_port and mqtt_client_id must be set",
        ));
    }
    if cfg.gpio_backend == GpioBackend::Cdev && cfg.gpio_chip.is_empty() {
        return Err(ConfigError::ValidationFailed("gpio_chip must not be empty"));
    }
    log_sink::parse_level(&cfg.log_level)?;
    Ok(())
}

/// Load the stored config, writing the defaults on first run.
///
/// A failed first-run save is only a warning; the defaults are still
/// returned.  Other load errors are passed through.
pub fn load_or_init<C: ConfigPort>(store: &C) -> Result<BridgeConfig, ConfigError> {
    match store.load() {
        Err(ConfigError::NotFound) => {
            let defaults = BridgeConfig::default();
            match store.save(&defaults) {
                Ok(()) => info!("no config found, defaults written"),
                Err(e) => warn!("no config found, defaults not written: {}", e),
            }
            Ok(defaults)
        }
        other => other,
    }
}

impl ConfigPort for JsonFileConfig {
    fn load(&self) -> Result<BridgeConfig, ConfigError> {
        let text = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ConfigError::NotFound,
            _ => ConfigError::IoError,
        })?;
        let cfg: BridgeConfig = serde_json::from_str(&text).map_err(|_| ConfigError::Corrupted)?;
        validate_config(&cfg)?;
        info!("config loaded from {}", self.path.display());
        Ok(cfg)
    }

    fn save(&self, config: &BridgeConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let text = serde_json::to_string_pretty(config).map_err(|_| ConfigError::IoError)?;
        fs::write(&self.path, text).map_err(|_| ConfigError::IoError)
    }
}
