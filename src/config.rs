//! Bridge configuration parameters
//!
//! All tunable parameters for the Rokku bridge.  Loaded from a JSON file
//! through [`JsonFileConfig`](crate::adapters::config_file::JsonFileConfig);
//! every field has a default matching the reference board wiring.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::gpio::{PinId, PullMode};
use crate::pins;
use crate::pubsub;

/// What the dispatcher does when the voice client call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallFailurePolicy {
    /// Log at error level, keep looping.  Mute state is best effort.
    #[default]
    LogAndContinue,
    /// Abort the bridge routine; pins are reset and the unit exits failed.
    Propagate,
}

/// Digital pin backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpioBackend {
    /// Linux GPIO character device, with kernel-applied pull resistors.
    #[default]
    Cdev,
    /// Linux `/sys/class/gpio`.  Cannot set pull resistors.
    Sysfs,
    /// In-memory board, for bench runs without hardware.
    Sim,
}

/// Pub/sub transport selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// MQTT broker; every unit runs as its own process.
    #[default]
    Mqtt,
    /// In-process broker; units run as threads of one process.
    Local,
}

/// Core bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    // --- Pins ---
    pub button_gpio: PinId,
    /// Bias on the button line.  Pull-up means pressed reads LOW.
    pub button_pull: PullMode,
    pub led_gpio: PinId,
    pub buzzer_gpio: PinId,
    pub gpio_backend: GpioBackend,
    /// Character device (only used by the cdev backend).
    pub gpio_chip: String,
    /// Root of the sysfs GPIO tree (only used by the sysfs backend).
    pub sysfs_root: String,
    /// The board has fixed pull resistors, so sysfs may accept a pull
    /// mode it cannot set itself.
    pub sysfs_external_bias: bool,

    // --- Monitor ---
    /// Button poll interval (milliseconds).  Must exceed switch bounce.
    pub poll_interval_ms: u64,

    // --- Voice client ---
    /// Program invoked as `<voice_client> rpc mute|unmute`.
    pub voice_client: String,
    pub call_failure_policy: CallFailurePolicy,

    // --- Pub/sub ---
    /// Human-readable topic namespace.
    pub namespace: String,
    /// Replace the namespace with its SHA-256 digest in topic names.
    pub hash_namespace: bool,
    pub publish_suffix: String,
    pub subscribe_suffix: String,
    pub transport: TransportKind,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    /// Unit processes connect as `<mqtt_client_id>-<unit>`.
    pub mqtt_client_id: String,

    // --- Supervision ---
    /// Bounded terminate used at shutdown, and the longest the listener
    /// unit may take to subscribe (milliseconds).
    pub terminate_timeout_ms: u64,

    // --- Logging ---
    /// One of `trace`, `debug`, `info`, `warn`, `error`, `off`.
    pub log_level: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            // Pins
            button_gpio: pins::TALK_BUTTON_GPIO,
            button_pull: PullMode::Up,
            led_gpio: pins::TALK_LED_GPIO,
            buzzer_gpio: pins::BUZZER_GPIO,
            gpio_backend: GpioBackend::Cdev,
            gpio_chip: "/dev/gpiochip0".into(),
            sysfs_root: "/sys/class/gpio".into(),
            sysfs_external_bias: false,

            // Monitor
            poll_interval_ms: 100, // 10 Hz

            // Voice client
            voice_client: "mumble".into(),
            call_failure_policy: CallFailurePolicy::LogAndContinue,

            // Pub/sub
            namespace: "Rokku".into(),
            hash_namespace: true,
            publish_suffix: "in_to_out".into(),
            subscribe_suffix: "out_to_in".into(),
            transport: TransportKind::Mqtt,
            mqtt_host: "localhost".into(),
            mqtt_port: 1883,
            mqtt_client_id: "rokku-bridge".into(),

            // Supervision
            terminate_timeout_ms: 5_000,

            // Logging
            log_level: "info".into(),
        }
    }
}

impl BridgeConfig {
    /// Simulated board on the in-process broker: no hardware, no network.
    pub fn bench() -> Self {
        Self {
            gpio_backend: GpioBackend::Sim,
            transport: TransportKind::Local,
            ..Self::default()
        }
    }

    /// MQTT client id for the parent (`None`) or a unit process.
    pub fn mqtt_client_id_for(&self, unit: Option<&str>) -> String {
        match unit {
            Some(unit) => format!("{}-{}", self.mqtt_client_id, unit),
            None => self.mqtt_client_id.clone(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_millis(self.terminate_timeout_ms)
    }

    /// Topic prefix for this bridge's namespace.
    pub fn topic_prefix(&self) -> String {
        if self.hash_namespace {
            pubsub::hash_prefix(&self.namespace)
        } else {
            self.namespace.clone()
        }
    }
}
