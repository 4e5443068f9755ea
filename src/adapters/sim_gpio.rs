//! In-memory GPIO backend.
//!
//! A [`SimBoard`] stands in for the physical header: tests (or a bench
//! run with no hardware) drive input lines from outside and observe
//! output levels.  Each [`SimGpio`] obtained from [`SimBoard::scope`] is
//! an independent [`GpioPort`] scope over the same board.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::PinError;
use crate::gpio::{Direction, GpioPort, Level, PinConfig, PinId, PullMode};

#[derive(Debug, Default)]
struct SimLine {
    config: Option<PinConfig>,
    /// Level driven by the board when configured as output.
    driven: Level,
    /// Level applied from outside (button contact, test harness).
    external: Option<Level>,
    fail_io: bool,
}

#[derive(Debug, Default)]
struct BoardState {
    lines: BTreeMap<PinId, SimLine>,
    cleanups: usize,
}

/// Shared simulated header.
#[derive(Debug, Clone, Default)]
pub struct SimBoard {
    state: Arc<Mutex<BoardState>>,
}

impl SimBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// New, empty GPIO scope on this board.
    pub fn scope(&self) -> SimGpio {
        SimGpio {
            board: self.clone(),
            owned: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }

    /// Apply an external level to a line (e.g. close the button contact).
    pub fn drive(&self, pin: PinId, level: Level) {
        self.with(|s| s.lines.entry(pin).or_default().external = Some(level));
    }

    /// Remove the external drive; the line floats back to its pull level.
    pub fn release(&self, pin: PinId) {
        self.with(|s| s.lines.entry(pin).or_default().external = None);
    }

    /// Make every read and write on `pin` fail.
    pub fn inject_fault(&self, pin: PinId) {
        self.with(|s| s.lines.entry(pin).or_default().fail_io = true);
    }

    /// Level the board currently drives on an output line.
    pub fn level(&self, pin: PinId) -> Level {
        self.with(|s| s.lines.get(&pin).map_or(Level::Low, |l| l.driven))
    }

    pub fn config(&self, pin: PinId) -> Option<PinConfig> {
        self.with(|s| s.lines.get(&pin).and_then(|l| l.config))
    }

    /// Released and not driving.
    pub fn is_neutral(&self, pin: PinId) -> bool {
        self.config(pin).is_none() && self.level(pin) == Level::Low
    }

    /// Number of `reset_all` calls made on any scope of this board.
    pub fn cleanups(&self) -> usize {
        self.with(|s| s.cleanups)
    }

    fn with<R>(&self, f: impl FnOnce(&mut BoardState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

/// One [`GpioPort`] scope on a [`SimBoard`].
#[derive(Debug, Clone)]
pub struct SimGpio {
    board: SimBoard,
    owned: Arc<Mutex<BTreeSet<PinId>>>,
}

impl SimGpio {
    fn fault(pin: PinId) -> PinError {
        PinError::Io {
            pin,
            kind: io::ErrorKind::Other,
        }
    }
}

impl GpioPort for SimGpio {
    fn configure(&self, config: PinConfig) -> Result<(), PinError> {
        self.board.with(|s| {
            let line = s.lines.entry(config.id).or_default();
            if line.fail_io {
                return Err(Self::fault(config.id));
            }
            line.config = Some(config);
            line.driven = Level::Low;
            Ok(())
        })?;
        self.owned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(config.id);
        Ok(())
    }

    fn read(&self, pin: PinId) -> Result<Level, PinError> {
        self.board.with(|s| {
            let line = s.lines.get(&pin).ok_or(PinError::NotConfigured(pin))?;
            if line.fail_io {
                return Err(Self::fault(pin));
            }
            let config = line.config.ok_or(PinError::NotConfigured(pin))?;
            Ok(match config.direction {
                Direction::Output => line.driven,
                Direction::Input => line.external.unwrap_or(match config.pull {
                    PullMode::Up => Level::High,
                    PullMode::Down | PullMode::None => Level::Low,
                }),
            })
        })
    }

    fn write(&self, pin: PinId, level: Level) -> Result<(), PinError> {
        self.board.with(|s| {
            let line = s.lines.get_mut(&pin).ok_or(PinError::NotConfigured(pin))?;
            if line.fail_io {
                return Err(Self::fault(pin));
            }
            match line.config {
                None => Err(PinError::NotConfigured(pin)),
                Some(c) if c.direction == Direction::Input => Err(PinError::WrongDirection(pin)),
                Some(_) => {
                    line.driven = level;
                    Ok(())
                }
            }
        })
    }

    fn reset_all(&self) -> Result<(), PinError> {
        let owned: Vec<PinId> = std::mem::take(
            &mut *self.owned.lock().unwrap_or_else(PoisonError::into_inner),
        )
        .into_iter()
        .collect();
        self.board.with(|s| {
            for pin in owned {
                if let Some(line) = s.lines.get_mut(&pin) {
                    line.driven = Level::Low;
                    line.config = None;
                }
            }
            s.cleanups += 1;
        });
        Ok(())
    }
}
