//! Toggle-mute bridge: talk button → LED mirror + voice client mute.
//!
//! ```text
//!   button ──▶ DebouncedInput ──▶ MuteDispatcher ──┬─▶ talk LED
//!                                                  ├─▶ voice client
//!                                                  └─▶ ["mute", muted]
//! ```
//!
//! The routine owns its pins through a [`PinGuard`], so they are reset
//! exactly once however it ends.

use std::process::Command;
use std::time::Duration;

use log::{error, info, warn};

use crate::app::events::MUTE;
use crate::app::ports::VoiceClient;
use crate::config::{BridgeConfig, CallFailurePolicy};
use crate::dispatcher::MuteDispatcher;
use crate::drivers::status_led::TalkLed;
use crate::error::Result;
use crate::gpio::{GpioPort, PinGuard, PinId, PullMode};
use crate::monitor::DebouncedInput;
use crate::pubsub::Publisher;
use crate::supervisor::{self, Interrupt, SupervisedProcess};

/// Unit name used for logging and the thread name.
pub const UNIT_NAME: &str = "Toggle Mumble Mute";

fn report_start(unit: Option<&SupervisedProcess>) {
    match unit {
        Some(_) => info!("togglemute button successfully configured"),
        None => error!("unable to configure togglemute button"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleMuteSettings {
    pub button: PinId,
    pub pull: PullMode,
    pub led: PinId,
    pub interval: Duration,
    pub policy: CallFailurePolicy,
}

impl From<&BridgeConfig> for ToggleMuteSettings {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            button: config.button_gpio,
            pull: config.button_pull,
            led: config.led_gpio,
            interval: config.poll_interval(),
            policy: config.call_failure_policy,
        }
    }
}

impl Default for ToggleMuteSettings {
    fn default() -> Self {
        Self::from(&BridgeConfig::default())
    }
}

/// Run the bridge until `interrupt` is raised or a fatal error occurs.
///
/// Mute changes are announced on `publisher` when one is given; a failed
/// announcement is only a warning.
pub fn togglemute<G, V>(
    gpio: &G,
    voice: &V,
    publisher: Option<&Publisher>,
    settings: ToggleMuteSettings,
    interrupt: Interrupt,
) -> Result<()>
where
    G: GpioPort,
    V: VoiceClient + ?Sized,
{
    let _guard = PinGuard::new(gpio.clone());

    let button = gpio.input(settings.button, settings.pull)?;
    let mut led = TalkLed::new(gpio.output(settings.led)?);
    let mut dispatcher = MuteDispatcher::new(settings.policy);

    for signal in DebouncedInput::new(button, settings.pull, settings.interval, interrupt.clone()) {
        let signal = signal?;
        if dispatcher.on_signal(&signal, &mut led, voice)?.is_none() {
            continue;
        }
        if let Some(publisher) = publisher {
            if let Err(e) = publisher.publish_record(MUTE, dispatcher.is_muted()) {
                warn!("unable to announce mute state: {}", e);
            }
        }
    }

    if interrupt.is_raised() {
        info!("togglemute interrupted");
    }
    Ok(())
}

/// Start [`togglemute`] as a supervised unit.
///
/// Returns `None`, after logging at error level, if the unit could not be
/// started.
pub fn start_togglemute<G, V>(
    gpio: G,
    voice: V,
    publisher: Option<Publisher>,
    settings: ToggleMuteSettings,
) -> Option<SupervisedProcess>
where
    G: GpioPort,
    V: VoiceClient + 'static,
{
    let unit = supervisor::start(UNIT_NAME, move |interrupt| {
        togglemute(&gpio, &voice, publisher.as_ref(), settings, interrupt)
    });
    report_start(unit.as_ref());
    unit
}

/// Start the bridge as a child process running `command`, which must end
/// up in [`togglemute`] under [`supervisor::run_unit`].
pub fn spawn_togglemute(command: Command) -> Option<SupervisedProcess> {
    let unit = supervisor::spawn(UNIT_NAME, command);
    report_start(unit.as_ref());
    unit
}
