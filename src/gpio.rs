//! Digital pin abstraction.
//!
//! A [`GpioPort`] is the capability to configure, read and write named
//! digital lines.  Each instance is a *scope*: [`GpioPort::reset_all`]
//! releases only the lines configured through that instance, so every
//! supervised unit owns its pin set and returns it to a neutral state on
//! exit without touching lines owned by another unit.
//!
//! Individual lines are handed to drivers as [`PinHandle`]s, which
//! implement the `embedded-hal` 1.0 digital traits.  Drivers are written
//! against `InputPin` / `OutputPin` and never see the port directly.

use core::fmt;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use serde::{Deserialize, Serialize};

use crate::error::PinError;

/// Broadcom GPIO line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PinId(pub u32);

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// Internal bias resistor selection for input lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullMode {
    #[default]
    None,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    #[default]
    Low,
    High,
}

impl Level {
    pub fn from_bool(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }

    pub fn is_high(self) -> bool {
        matches!(self, Self::High)
    }
}

/// Electrical configuration of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinConfig {
    pub id: PinId,
    pub direction: Direction,
    pub pull: PullMode,
}

impl PinConfig {
    pub fn input(id: PinId, pull: PullMode) -> Self {
        Self {
            id,
            direction: Direction::Input,
            pull,
        }
    }

    pub fn output(id: PinId) -> Self {
        Self {
            id,
            direction: Direction::Output,
            pull: PullMode::None,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Port
// ───────────────────────────────────────────────────────────────

/// Digital pin capability.
///
/// Methods take `&self`; adapters keep their state behind shared
/// interior mutability so that cloned handles address the same scope.
pub trait GpioPort: Clone + Send + 'static {
    /// Configure a line.  Reconfiguring an already-owned line is allowed.
    fn configure(&self, config: PinConfig) -> Result<(), PinError>;

    fn read(&self, pin: PinId) -> Result<Level, PinError>;

    fn write(&self, pin: PinId, level: Level) -> Result<(), PinError>;

    /// Return every line configured through this scope to its neutral
    /// state (output low, then released).
    fn reset_all(&self) -> Result<(), PinError>;

    /// Configure `pin` as an input and hand it out as an `embedded-hal` pin.
    fn input(&self, pin: PinId, pull: PullMode) -> Result<PinHandle<Self>, PinError> {
        self.configure(PinConfig::input(pin, pull))?;
        Ok(PinHandle {
            gpio: self.clone(),
            id: pin,
        })
    }

    /// Configure `pin` as an output (driven low) and hand it out.
    fn output(&self, pin: PinId) -> Result<PinHandle<Self>, PinError> {
        self.configure(PinConfig::output(pin))?;
        Ok(PinHandle {
            gpio: self.clone(),
            id: pin,
        })
    }
}

// ───────────────────────────────────────────────────────────────
// embedded-hal bridge
// ───────────────────────────────────────────────────────────────

/// One configured line, usable wherever `embedded-hal` expects a pin.
#[derive(Debug, Clone)]
pub struct PinHandle<G> {
    gpio: G,
    id: PinId,
}

impl<G> PinHandle<G> {
    pub fn id(&self) -> PinId {
        self.id
    }
}

impl<G: GpioPort> ErrorType for PinHandle<G> {
    type Error = PinError;
}

impl<G: GpioPort> InputPin for PinHandle<G> {
    fn is_high(&mut self) -> Result<bool, PinError> {
        self.gpio.read(self.id).map(Level::is_high)
    }

    fn is_low(&mut self) -> Result<bool, PinError> {
        self.is_high().map(|high| !high)
    }
}

impl<G: GpioPort> OutputPin for PinHandle<G> {
    fn set_low(&mut self) -> Result<(), PinError> {
        self.gpio.write(self.id, Level::Low)
    }

    fn set_high(&mut self) -> Result<(), PinError> {
        self.gpio.write(self.id, Level::High)
    }
}

// ───────────────────────────────────────────────────────────────
// Scoped cleanup
// ───────────────────────────────────────────────────────────────

/// Resets a scope when dropped.
///
/// Bridge routines create one before configuring any line, so the reset
/// runs exactly once on every exit path: normal return, `?` propagation,
/// interrupt, or unwinding panic.
pub struct PinGuard<G: GpioPort> {
    gpio: G,
}

impl<G: GpioPort> PinGuard<G> {
    pub fn new(gpio: G) -> Self {
        Self { gpio }
    }
}

impl<G: GpioPort> Drop for PinGuard<G> {
    fn drop(&mut self) {
        match self.gpio.reset_all() {
            Ok(()) => log::debug!("pins reset to neutral"),
            Err(e) => log::error!("pin cleanup failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sim_gpio::SimBoard;

    #[test]
    fn handles_follow_embedded_hal_semantics() {
        let board = SimBoard::new();
        let gpio = board.scope();
        let mut button = gpio.input(PinId(16), PullMode::Up).unwrap();
        assert!(button.is_high().unwrap());
        board.drive(PinId(16), Level::Low);
        assert!(button.is_low().unwrap());

        let mut led = gpio.output(PinId(12)).unwrap();
        led.set_high().unwrap();
        assert_eq!(board.level(PinId(12)), Level::High);
    }

    #[test]
    fn guard_resets_on_drop() {
        let board = SimBoard::new();
        let gpio = board.scope();
        {
            let _guard = PinGuard::new(gpio.clone());
            let mut led = gpio.output(PinId(12)).unwrap();
            led.set_high().unwrap();
        }
        assert!(board.is_neutral(PinId(12)));
        assert_eq!(board.cleanups(), 1);
    }

    #[test]
    fn level_from_bool() {
        assert_eq!(Level::from_bool(true), Level::High);
        assert!(!Level::from_bool(false).is_high());
    }
}
