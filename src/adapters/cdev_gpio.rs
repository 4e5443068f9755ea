//! Linux GPIO character-device backend (`/dev/gpiochipN`).
//!
//! Each configured line is held by its own kernel line request.  Unlike
//! sysfs, the request carries the bias flags, so a pulled-up button reads
//! HIGH when untouched even on lines whose power-on default is pull-down
//! (BCM16 on a Raspberry Pi).  Dropping a request releases the line.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use gpiocdev::Request;
use gpiocdev::line::{Bias, Value};
use log::{debug, warn};

use crate::error::PinError;
use crate::gpio::{Direction, GpioPort, Level, PinConfig, PinId, PullMode};

/// Consumer label shown by `gpioinfo` for lines we hold.
const CONSUMER: &str = "rokku-bridge";

/// Kernel bias flag for a requested pull mode.
pub(crate) fn bias_for(pull: PullMode) -> Bias {
    match pull {
        PullMode::None => Bias::Disabled,
        PullMode::Up => Bias::PullUp,
        PullMode::Down => Bias::PullDown,
    }
}

fn value_for(level: Level) -> Value {
    if level.is_high() { Value::Active } else { Value::Inactive }
}

struct Line {
    request: Request,
    direction: Direction,
}

struct Inner {
    chip: PathBuf,
    lines: Mutex<BTreeMap<PinId, Line>>,
}

/// One character-device GPIO scope on a chip.
#[derive(Clone)]
pub struct CdevGpio {
    inner: Arc<Inner>,
}

impl CdevGpio {
    pub fn new(chip: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                chip: chip.into(),
                lines: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    fn lines(&self) -> std::sync::MutexGuard<'_, BTreeMap<PinId, Line>> {
        self.inner.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn cdev_error(pin: PinId, e: &gpiocdev::Error) -> PinError {
    debug!("cdev: {}: {}", pin, e);
    PinError::Io {
        pin,
        kind: io::ErrorKind::Other,
    }
}

impl GpioPort for CdevGpio {
    fn configure(&self, config: PinConfig) -> Result<(), PinError> {
        let mut lines = self.lines();
        // Release any previous request so the line can be re-requested.
        lines.remove(&config.id);

        let mut builder = Request::builder();
        builder
            .on_chip(&self.inner.chip)
            .with_consumer(CONSUMER)
            .with_line(config.id.0);
        match config.direction {
            Direction::Input => {
                builder.as_input().with_bias(bias_for(config.pull));
            }
            Direction::Output => {
                builder.as_output(Value::Inactive);
            }
        }
        let request = builder.request().map_err(|e| cdev_error(config.id, &e))?;
        debug!("cdev: requested {} as {:?} ({:?})", config.id, config.direction, config.pull);
        lines.insert(
            config.id,
            Line {
                request,
                direction: config.direction,
            },
        );
        Ok(())
    }

    fn read(&self, pin: PinId) -> Result<Level, PinError> {
        let lines = self.lines();
        let line = lines.get(&pin).ok_or(PinError::NotConfigured(pin))?;
        let value = line.request.value(pin.0).map_err(|e| cdev_error(pin, &e))?;
        Ok(Level::from_bool(matches!(value, Value::Active)))
    }

    fn write(&self, pin: PinId, level: Level) -> Result<(), PinError> {
        let lines = self.lines();
        let line = lines.get(&pin).ok_or(PinError::NotConfigured(pin))?;
        if line.direction == Direction::Input {
            return Err(PinError::WrongDirection(pin));
        }
        line.request
            .set_value(pin.0, value_for(level))
            .map_err(|e| cdev_error(pin, &e))
    }

    fn reset_all(&self) -> Result<(), PinError> {
        let owned = std::mem::take(&mut *self.lines());
        let mut first_err = None;
        for (pin, line) in owned {
            if line.direction == Direction::Output {
                if let Err(e) = line.request.set_value(pin.0, Value::Inactive) {
                    let e = cdev_error(pin, &e);
                    warn!("cdev: could not drive {} low: {}", pin, e);
                    first_err.get_or_insert(e);
                }
            }
            // Dropping the request releases the line.
        }
        first_err.map_or(Ok(()), Err)
    }
}
