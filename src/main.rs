//! Rokku bridge main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  BoardGpio (cdev/sysfs/sim)  CommandLineVoiceClient            │
//! │  MqttTransport / LocalBroker (Transport)                       │
//! │  JsonFileConfig (ConfigPort)    log_sink (tracing-subscriber)  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌──────────────────────┐   ┌────────────────────────────┐     │
//! │  │ Toggle Mumble Mute   │   │ behaviors (alarm router)   │     │
//! │  │ monitor · dispatcher │   │                            │     │
//! │  └──────────────────────┘   └────────────────────────────┘     │
//! │                                                                │
//! │  supervisor: one child process per unit, Ctrl-C → SIGINT       │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage:
//!
//! ```text
//! rokku-bridge [CONFIG]                          supervise every unit
//! rokku-bridge unit <togglemute|listen> [CONFIG] run one unit (child)
//! ```
#![deny(unused_must_use)]

use std::io;
use std::process::Command;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::Receiver as Inbound;
use log::{error, info, warn};

use rokku_bridge::adapters::board_gpio::BoardGpio;
use rokku_bridge::adapters::config_file::{self, JsonFileConfig};
use rokku_bridge::adapters::local_broker::LocalBroker;
use rokku_bridge::adapters::log_sink;
use rokku_bridge::adapters::mqtt_transport::{MqttSettings, MqttTransport};
use rokku_bridge::adapters::sim_gpio::SimBoard;
use rokku_bridge::adapters::voice_client::CommandLineVoiceClient;
use rokku_bridge::app::ports::{ConfigPort, Transport};
use rokku_bridge::behaviors::{self, BehaviorPins};
use rokku_bridge::config::{BridgeConfig, GpioBackend, TransportKind};
use rokku_bridge::pubsub::{self, Publisher};
use rokku_bridge::supervisor::{self, SupervisedProcess};
use rokku_bridge::togglemute::{self, ToggleMuteSettings};

const DEFAULT_CONFIG_PATH: &str = "/etc/rokku/bridge.json";

/// `unit` subcommand names.
const TOGGLEMUTE_UNIT: &str = "togglemute";
const LISTEN_UNIT: &str = "listen";

/// How often the main process checks that some unit is still running.
const LIVENESS_POLL: Duration = Duration::from_secs(1);

/// What this process was started to do.
#[derive(Debug, PartialEq, Eq)]
enum Invocation {
    Bridge { config: String },
    Unit { name: String, config: String },
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Invocation> {
    let first = args.next();
    let invocation = match first.as_deref() {
        Some("unit") => {
            let name = args.next().context("usage: rokku-bridge unit <togglemute|listen>")?;
            let config = args.next().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_owned());
            Invocation::Unit { name, config }
        }
        Some(path) => Invocation::Bridge {
            config: path.to_owned(),
        },
        None => Invocation::Bridge {
            config: DEFAULT_CONFIG_PATH.to_owned(),
        },
    };
    if let Some(extra) = args.next() {
        anyhow::bail!("unexpected argument {extra:?}");
    }
    Ok(invocation)
}

fn main() -> Result<()> {
    match parse_args(std::env::args().skip(1))? {
        Invocation::Bridge { config } => run_bridge(&config),
        Invocation::Unit { name, config } => {
            let code = run_unit_process(&name, &config)?;
            std::process::exit(code)
        }
    }
}

fn banner() {
    info!("╔══════════════════════════════════════╗");
    info!("║  Rokku bridge v{}                 ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");
}

fn mqtt_settings(config: &BridgeConfig, unit: Option<&str>) -> MqttSettings {
    MqttSettings {
        host: config.mqtt_host.clone(),
        port: config.mqtt_port,
        client_id: config.mqtt_client_id_for(unit),
    }
}

fn connect(config: &BridgeConfig, unit: Option<&str>) -> Result<Arc<dyn Transport>> {
    let transport: Arc<dyn Transport> = match config.transport {
        TransportKind::Mqtt => Arc::new(MqttTransport::connect(&mqtt_settings(config, unit))?),
        TransportKind::Local => Arc::new(LocalBroker::new()),
    };
    Ok(transport)
}

// ───────────────────────────────────────────────────────────────
// Supervising process
// ───────────────────────────────────────────────────────────────

fn run_bridge(path: &str) -> Result<()> {
    // ── 1. Ctrl-C, before any unit exists ─────────────────────
    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })?;

    // ── 2. Logging (level from the stored config, if any) ─────
    let store = JsonFileConfig::new(path);
    let level = store.load().map_or_else(|_| BridgeConfig::default().log_level, |c| c.log_level);
    log_sink::init(&level)?;
    banner();

    // ── 3. Config, written out on first run ───────────────────
    let config = match config_file::load_or_init(&store) {
        Ok(config) => {
            info!("config from {}", path);
            config
        }
        Err(e) => {
            warn!("config load failed ({}), using defaults", e);
            BridgeConfig::default()
        }
    };
    if config.gpio_backend == GpioBackend::Sim {
        warn!("GPIO backend: simulated board, no hardware is touched");
    }

    // ── 4. Units ──────────────────────────────────────────────
    let units = match config.transport {
        TransportKind::Mqtt => {
            info!("transport: MQTT {}:{}", config.mqtt_host, config.mqtt_port);
            start_processes(&config, path)?
        }
        TransportKind::Local => {
            info!("transport: in-process broker, units run as threads");
            start_threads(&config)
        }
    };
    if units.is_empty() {
        anyhow::bail!("no unit could be started");
    }
    supervise(units, &stop_rx, config.terminate_timeout());
    info!("bridge stopped");
    Ok(())
}

/// `rokku-bridge unit <name> <config>` for this same executable.
fn unit_command(name: &str, config_path: &str) -> Result<Command> {
    let exe = std::env::current_exe().context("cannot locate own executable")?;
    let mut command = Command::new(exe);
    command.arg("unit").arg(name).arg(config_path);
    Ok(command)
}

/// Every unit in its own process; the behavior router stays here, fed by
/// the listener process.
fn start_processes(config: &BridgeConfig, path: &str) -> Result<Vec<SupervisedProcess>> {
    let mut units = Vec::new();
    let transport = connect(config, None)?;

    let prefix = config.topic_prefix();
    let listener = unit_command(LISTEN_UNIT, path)?;
    match pubsub::setup_process(
        transport,
        &prefix,
        &config.publish_suffix,
        &config.subscribe_suffix,
        listener,
        config.terminate_timeout(),
    ) {
        Some(binding) => {
            info!("pub/sub bound under {}", prefix);
            let (publisher, inbound, listener) = binding.into_parts();
            units.push(listener);
            let gpio = BoardGpio::open(config, &SimBoard::new());
            units.extend(start_behaviors(config, gpio, publisher, inbound));
        }
        None => warn!("pub/sub unavailable, alarms will not be served"),
    }

    units.extend(togglemute::spawn_togglemute(unit_command(TOGGLEMUTE_UNIT, path)?));
    Ok(units)
}

/// Bench layout: one process, one broker, one board.
fn start_threads(config: &BridgeConfig) -> Vec<SupervisedProcess> {
    let mut units = Vec::new();
    let board = SimBoard::new();
    let transport: Arc<dyn Transport> = Arc::new(LocalBroker::new());

    let prefix = config.topic_prefix();
    let publisher = match pubsub::setup(
        transport,
        &prefix,
        &config.publish_suffix,
        &config.subscribe_suffix,
    ) {
        Some(binding) => {
            info!("pub/sub bound under {}", prefix);
            let (publisher, inbound, listener) = binding.into_parts();
            units.push(listener);
            let gpio = BoardGpio::open(config, &board);
            units.extend(start_behaviors(config, gpio, publisher.clone(), inbound));
            Some(publisher)
        }
        None => {
            warn!("pub/sub unavailable, mute changes will not be announced");
            None
        }
    };

    let voice = CommandLineVoiceClient::new(config.voice_client.clone());
    units.extend(togglemute::start_togglemute(
        BoardGpio::open(config, &board),
        voice,
        publisher,
        ToggleMuteSettings::from(config),
    ));
    units
}

fn start_behaviors(
    config: &BridgeConfig,
    gpio: BoardGpio,
    publisher: Publisher,
    inbound: Inbound<String>,
) -> Option<SupervisedProcess> {
    let pins = BehaviorPins {
        buzzer: config.buzzer_gpio,
    };
    supervisor::start("behaviors", move |interrupt| {
        behaviors::serve(&inbound, &publisher, &gpio, pins, &interrupt)
    })
}

/// Wait for Ctrl-C or for every unit to die, then stop them all.
fn supervise(mut units: Vec<SupervisedProcess>, stop: &Receiver<()>, timeout: Duration) {
    loop {
        match stop.recv_timeout(LIVENESS_POLL) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                info!("keyboard interruption");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                if units.iter_mut().all(|u| !u.is_alive()) {
                    warn!("every unit has exited, shutting down");
                    break;
                }
            }
        }
    }

    for unit in units {
        let name = unit.name().to_owned();
        if let Err(e) = unit.terminate_timeout(timeout) {
            error!("{}: {}", name, e);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Unit process
// ───────────────────────────────────────────────────────────────

/// Run one unit until SIGINT and return the process exit code.
fn run_unit_process(name: &str, path: &str) -> Result<i32> {
    let config = JsonFileConfig::new(path).load().unwrap_or_default();
    log_sink::init(&config.log_level)?;

    let status = match name {
        TOGGLEMUTE_UNIT => {
            let gpio = BoardGpio::open(&config, &SimBoard::new());
            let voice = CommandLineVoiceClient::new(config.voice_client.clone());
            let publisher = match connect(&config, Some(TOGGLEMUTE_UNIT)) {
                Ok(transport) => Some(Publisher::new(
                    transport,
                    pubsub::topic(&config.topic_prefix(), &config.publish_suffix),
                )),
                Err(e) => {
                    warn!("pub/sub unavailable ({}), mute changes will not be announced", e);
                    None
                }
            };
            let settings = ToggleMuteSettings::from(&config);
            supervisor::run_unit(togglemute::UNIT_NAME, |interrupt| {
                togglemute::togglemute(&gpio, &voice, publisher.as_ref(), settings, interrupt)
            })
        }
        LISTEN_UNIT => {
            let transport = connect(&config, Some(LISTEN_UNIT))?;
            let sub_topic = pubsub::topic(&config.topic_prefix(), &config.subscribe_suffix);
            supervisor::run_unit(&format!("listen {}", config.subscribe_suffix), |interrupt| {
                pubsub::listen(&*transport, &sub_topic, &mut io::stdout().lock(), &interrupt)
            })
        }
        other => anyhow::bail!("unknown unit {other:?}"),
    };
    Ok(status.exit_code())
}
