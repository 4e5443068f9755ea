//! Alarm behavior: drive the buzzer and announce its state.

use log::info;

use crate::app::events::ALARM;
use crate::drivers::buzzer::Buzzer;
use crate::error::Result;
use crate::gpio::{GpioPort, PinId};
use crate::pins;
use crate::pubsub::Publisher;

/// Sound (`true`) or silence (`false`) the buzzer on the board's buzzer
/// line, then publish `["alarm", sounding]`.
pub fn alarm<G: GpioPort>(publisher: &Publisher, gpio: &G, flag: bool) -> Result<()> {
    alarm_on(publisher, gpio, pins::BUZZER_GPIO, flag)
}

/// [`alarm`] on an explicit line.
///
/// The buzzer is rebuilt on every call; nothing is remembered between
/// calls, so the published state is always what was just driven.
pub fn alarm_on<G: GpioPort>(
    publisher: &Publisher,
    gpio: &G,
    pin: PinId,
    flag: bool,
) -> Result<()> {
    let mut buzzer = Buzzer::new(gpio.output(pin)?)?;
    if flag {
        buzzer.sound()?;
    } else {
        buzzer.silence()?;
    }
    let sounding = buzzer.state().sounding;
    info!("alarm {}", if sounding { "on" } else { "off" });
    publisher.publish_record(ALARM, sounding)
}
