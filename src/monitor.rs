//! Debounced input monitor.
//!
//! Polls a button line at a fixed interval and turns raw levels into a
//! pressed/released [`LogicalSignal`].  Debouncing is by sampling rate:
//! the first sample that differs from the current debounced level is
//! trusted, which is enough as long as the poll interval is longer than
//! the switch's bounce time (a few ms for a tactile switch vs. the
//! 100 ms default interval).
//!
//! The monitor is an [`Iterator`]: lazy, infinite until interrupted, and
//! not restartable.  A read failure is yielded once and then the
//! sequence ends.

use std::time::{Duration, Instant};

use embedded_hal::digital::InputPin;

use crate::error::{PinError, Result};
use crate::gpio::{Level, PullMode};
use crate::supervisor::Interrupt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

impl ButtonState {
    /// Interpret a raw level given the line's bias.  A pulled-up button
    /// shorts to ground when pressed.
    pub fn from_level(level: Level, pull: PullMode) -> Self {
        let pressed = match pull {
            PullMode::Up => !level.is_high(),
            PullMode::Down | PullMode::None => level.is_high(),
        };
        if pressed { Self::Pressed } else { Self::Released }
    }

    pub fn is_pressed(self) -> bool {
        matches!(self, Self::Pressed)
    }
}

/// One poll result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalSignal {
    pub raw: Level,
    pub debounced: ButtonState,
    pub sampled_at: Instant,
    /// The debounced level differs from the previous poll's.  Always
    /// `true` for the first poll.
    pub changed: bool,
}

pub struct DebouncedInput<P> {
    pin: P,
    pull: PullMode,
    interval: Duration,
    interrupt: Interrupt,
    last: Option<ButtonState>,
    changed: bool,
    polls: u64,
    done: bool,
}

impl<P> DebouncedInput<P>
where
    P: InputPin<Error = PinError>,
{
    pub fn new(pin: P, pull: PullMode, interval: Duration, interrupt: Interrupt) -> Self {
        Self {
            pin,
            pull,
            interval,
            interrupt,
            last: None,
            changed: false,
            polls: 0,
            done: false,
        }
    }

    /// Current debounced level, `None` before the first poll.
    pub fn state(&self) -> Option<ButtonState> {
        self.last
    }

    /// Whether the latest sample changed the debounced level.
    pub fn transition(&self) -> bool {
        self.changed
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }

    fn sample(&mut self) -> Result<LogicalSignal> {
        let raw = Level::from_bool(self.pin.is_high()?);
        let debounced = ButtonState::from_level(raw, self.pull);
        let changed = self.last != Some(debounced);
        self.last = Some(debounced);
        self.changed = changed;
        self.polls += 1;
        Ok(LogicalSignal {
            raw,
            debounced,
            sampled_at: Instant::now(),
            changed,
        })
    }
}

impl<P> Iterator for DebouncedInput<P>
where
    P: InputPin<Error = PinError>,
{
    type Item = Result<LogicalSignal>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.interrupt.is_raised() {
            self.done = true;
            return None;
        }
        // The first sample is taken immediately to establish state.
        if self.polls > 0 && self.interrupt.sleep(self.interval) {
            self.done = true;
            return None;
        }
        let sample = self.sample();
        if sample.is_err() {
            self.done = true;
        }
        Some(sample)
    }
}

impl<P> core::iter::FusedIterator for DebouncedInput<P> where P: InputPin<Error = PinError> {}
