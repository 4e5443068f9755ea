//! GPIO backend chosen at run time from [`BridgeConfig::gpio_backend`].

use crate::config::{BridgeConfig, GpioBackend};
use crate::error::PinError;
use crate::gpio::{GpioPort, Level, PinConfig, PinId};

use super::cdev_gpio::CdevGpio;
use super::sim_gpio::{SimBoard, SimGpio};
use super::sysfs_gpio::SysfsGpio;

/// One GPIO scope on whichever backend the config selects.
#[derive(Clone)]
pub enum BoardGpio {
    Sim(SimGpio),
    Sysfs(SysfsGpio),
    Cdev(CdevGpio),
}

impl BoardGpio {
    /// Open a new scope.  `sim` provides it when the simulated board is
    /// selected, so every unit in one process shares the same board.
    pub fn open(config: &BridgeConfig, sim: &SimBoard) -> Self {
        match config.gpio_backend {
            GpioBackend::Sim => Self::Sim(sim.scope()),
            GpioBackend::Sysfs if config.sysfs_external_bias => {
                Self::Sysfs(SysfsGpio::with_external_bias(&config.sysfs_root))
            }
            GpioBackend::Sysfs => Self::Sysfs(SysfsGpio::new(&config.sysfs_root)),
            GpioBackend::Cdev => Self::Cdev(CdevGpio::new(&config.gpio_chip)),
        }
    }
}

impl GpioPort for BoardGpio {
    fn configure(&self, config: PinConfig) -> Result<(), PinError> {
        match self {
            Self::Sim(gpio) => gpio.configure(config),
            Self::Sysfs(gpio) => gpio.configure(config),
            Self::Cdev(gpio) => gpio.configure(config),
        }
    }

    fn read(&self, pin: PinId) -> Result<Level, PinError> {
        match self {
            Self::Sim(gpio) => gpio.read(pin),
            Self::Sysfs(gpio) => gpio.read(pin),
            Self::Cdev(gpio) => gpio.read(pin),
        }
    }

    fn write(&self, pin: PinId, level: Level) -> Result<(), PinError> {
        match self {
            Self::Sim(gpio) => gpio.write(pin, level),
            Self::Sysfs(gpio) => gpio.write(pin, level),
            Self::Cdev(gpio) => gpio.write(pin, level),
        }
    }

    fn reset_all(&self) -> Result<(), PinError> {
        match self {
            Self::Sim(gpio) => gpio.reset_all(),
            Self::Sysfs(gpio) => gpio.reset_all(),
            Self::Cdev(gpio) => gpio.reset_all(),
        }
    }
}
