//! Linux sysfs GPIO backend (`/sys/class/gpio`).
//!
//! Each line is exported on first `configure` and unexported again by
//! `reset_all`.  The sysfs ABI has no bias control.  A pull request is
//! refused with [`PinError::BiasUnsupported`] unless the scope was built
//! with [`SysfsGpio::with_external_bias`], i.e. the board carries its own
//! resistors.  Prefer the character-device backend, which sets bias.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::PinError;
use crate::gpio::{Direction, GpioPort, Level, PinConfig, PinId, PullMode};

/// udev fixes up permissions on a freshly exported line asynchronously.
const EXPORT_SETTLE_RETRIES: u32 = 10;
const EXPORT_SETTLE_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug)]
struct Inner {
    root: PathBuf,
    external_bias: bool,
    owned: Mutex<Vec<PinId>>,
}

/// One sysfs GPIO scope.
#[derive(Debug, Clone)]
pub struct SysfsGpio {
    inner: Arc<Inner>,
}

impl SysfsGpio {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::build(root.into(), false)
    }

    /// Scope for a board whose pull resistors are fitted externally.
    /// Pull requests are then accepted as a description of the wiring.
    pub fn with_external_bias(root: impl Into<PathBuf>) -> Self {
        Self::build(root.into(), true)
    }

    fn build(root: PathBuf, external_bias: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                root,
                external_bias,
                owned: Mutex::new(Vec::new()),
            }),
        }
    }

    fn line_dir(&self, pin: PinId) -> PathBuf {
        self.inner.root.join(format!("gpio{}", pin.0))
    }

    fn write_attr(path: &Path, value: &str, pin: PinId) -> Result<(), PinError> {
        fs::write(path, value).map_err(|e| io_error(pin, &e))
    }

    fn export(&self, pin: PinId) -> Result<(), PinError> {
        if self.line_dir(pin).exists() {
            return Ok(());
        }
        Self::write_attr(&self.inner.root.join("export"), &pin.0.to_string(), pin)?;
        debug!("sysfs: exported {}", pin);
        Ok(())
    }

    fn set_direction(&self, pin: PinId, direction: Direction) -> Result<(), PinError> {
        // "low" configures an output and drives it low in one step.
        let value = match direction {
            Direction::Input => "in",
            Direction::Output => "low",
        };
        let path = self.line_dir(pin).join("direction");
        let mut attempt = 0;
        loop {
            match fs::write(&path, value) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied
                    && attempt < EXPORT_SETTLE_RETRIES =>
                {
                    attempt += 1;
                    thread::sleep(EXPORT_SETTLE_DELAY);
                }
                Err(e) => return Err(io_error(pin, &e)),
            }
        }
    }

    fn is_owned(&self, pin: PinId) -> bool {
        self.inner
            .owned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&pin)
    }
}

fn io_error(pin: PinId, e: &io::Error) -> PinError {
    PinError::Io {
        pin,
        kind: e.kind(),
    }
}

impl GpioPort for SysfsGpio {
    fn configure(&self, config: PinConfig) -> Result<(), PinError> {
        if config.pull != PullMode::None {
            if !self.inner.external_bias {
                return Err(PinError::BiasUnsupported(config.id));
            }
            info!("sysfs: {} relies on external {:?} resistor", config.id, config.pull);
        }
        self.export(config.id)?;
        {
            let mut owned = self.inner.owned.lock().unwrap_or_else(PoisonError::into_inner);
            if !owned.contains(&config.id) {
                owned.push(config.id);
            }
        }
        self.set_direction(config.id, config.direction)
    }

    fn read(&self, pin: PinId) -> Result<Level, PinError> {
        if !self.is_owned(pin) {
            return Err(PinError::NotConfigured(pin));
        }
        let raw = fs::read_to_string(self.line_dir(pin).join("value"))
            .map_err(|e| io_error(pin, &e))?;
        Ok(Level::from_bool(raw.trim() == "1"))
    }

    fn write(&self, pin: PinId, level: Level) -> Result<(), PinError> {
        if !self.is_owned(pin) {
            return Err(PinError::NotConfigured(pin));
        }
        let value = if level.is_high() { "1" } else { "0" };
        Self::write_attr(&self.line_dir(pin).join("value"), value, pin)
    }

    fn reset_all(&self) -> Result<(), PinError> {
        let owned = std::mem::take(
            &mut *self.inner.owned.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let mut first_err = None;
        for pin in owned {
            let result = self
                .set_direction(pin, Direction::Output)
                .and_then(|()| self.set_direction(pin, Direction::Input))
                .and_then(|()| {
                    Self::write_attr(&self.inner.root.join("unexport"), &pin.0.to_string(), pin)
                });
            if let Err(e) = result {
                warn!("sysfs: could not release {}: {}", pin, e);
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
