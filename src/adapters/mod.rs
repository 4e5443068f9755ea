//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter          | Implements  | Connects to                     |
//! |------------------|-------------|---------------------------------|
//! | `board_gpio`     | GpioPort    | Backend picked from config      |
//! | `cdev_gpio`      | GpioPort    | Linux `/dev/gpiochipN`          |
//! | `config_file`    | ConfigPort  | JSON file on disk               |
//! | `local_broker`   | Transport   | In-process topic fan-out        |
//! | `log_sink`       | (none)      | `tracing-subscriber` fmt output |
//! | `mqtt_transport` | Transport   | MQTT broker (`rumqttc`)         |
//! | `sim_gpio`       | GpioPort    | In-memory board                 |
//! | `sysfs_gpio`     | GpioPort    | Linux `/sys/class/gpio`         |
//! | `voice_client`   | VoiceClient | `<client> rpc mute\|unmute`     |

pub mod board_gpio;
pub mod cdev_gpio;
pub mod config_file;
pub mod local_broker;
pub mod log_sink;
pub mod mqtt_transport;
pub mod sim_gpio;
pub mod sysfs_gpio;
pub mod voice_client;
