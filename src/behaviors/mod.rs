//! Behavior handlers and the inbound router.
//!
//! Inbound messages are `[behavior_name, state]` records.  [`route`]
//! decodes one and calls the matching handler; unknown names are ignored
//! so several device types can share a topic.  [`serve`] runs the router
//! over the bridge's inbound queue until interrupted.

pub mod alarm;

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, info, warn};

use crate::app::events::{ALARM, BehaviorRecord};
use crate::error::{Error, Result};
use crate::gpio::{GpioPort, PinGuard, PinId};
use crate::pubsub::Publisher;
use crate::supervisor::Interrupt;

pub use alarm::{alarm, alarm_on};

/// How often [`serve`] checks its interrupt while the queue is empty.
const SERVE_POLL: Duration = Duration::from_millis(50);

/// Lines the behavior handlers drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BehaviorPins {
    pub buzzer: PinId,
}

impl Default for BehaviorPins {
    fn default() -> Self {
        Self {
            buzzer: crate::pins::BUZZER_GPIO,
        }
    }
}

/// Decode one inbound payload and run its handler.
///
/// Returns `Ok(true)` if a handler ran, `Ok(false)` for an unknown
/// behavior.  Malformed payloads are [`Error::Payload`].
pub fn route<G: GpioPort>(
    msg: &str,
    publisher: &Publisher,
    gpio: &G,
    pins: BehaviorPins,
) -> Result<bool> {
    let record = BehaviorRecord::decode(msg)?;
    match record.name() {
        ALARM => {
            let flag = record.state().as_bool().ok_or_else(|| {
                Error::Payload(format!("alarm state must be a bool, got {}", record.state()))
            })?;
            alarm_on(publisher, gpio, pins.buzzer, flag)?;
            Ok(true)
        }
        other => {
            debug!("ignoring behavior {:?}", other);
            Ok(false)
        }
    }
}

/// Route every message from `inbound` until interrupted or the queue
/// closes.  Lines driven by handlers are reset on exit.
///
/// Bad payloads are logged and skipped; pin and transport errors end the
/// loop.
pub fn serve<G: GpioPort>(
    inbound: &Receiver<String>,
    publisher: &Publisher,
    gpio: &G,
    pins: BehaviorPins,
    interrupt: &Interrupt,
) -> Result<()> {
    let _guard = PinGuard::new(gpio.clone());
    while !interrupt.is_raised() {
        let msg = match inbound.recv_timeout(SERVE_POLL) {
            Ok(msg) => msg,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                info!("inbound queue closed");
                return Ok(());
            }
        };
        match route(&msg, publisher, gpio, pins) {
            Ok(_) => {}
            Err(Error::Payload(reason)) => warn!("dropping {:?}: {}", msg, reason),
            Err(e) => return Err(e),
        }
    }
    info!("behaviors interrupted");
    Ok(())
}
