//! Action dispatcher: button state → LED mirror + voice client mute.
//!
//! | Debounced level | LED  | Voice call (only if state disagrees) |
//! |-----------------|------|--------------------------------------|
//! | Pressed         | on   | `rpc unmute`, muted := false         |
//! | Released        | off  | `rpc mute`,   muted := true          |
//!
//! The LED is rewritten on every poll.  The voice call is guarded by the
//! muted flag rather than by the raw transition, so seeing the same level
//! twice never produces a second call.

use embedded_hal::digital::OutputPin;
use log::{debug, error};

use crate::app::commands::VoiceCommand;
use crate::app::ports::VoiceClient;
use crate::config::CallFailurePolicy;
use crate::drivers::status_led::TalkLed;
use crate::error::{PinError, Result};
use crate::monitor::LogicalSignal;

/// Voice channel state as last commanded by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuteState {
    pub muted: bool,
}

impl Default for MuteState {
    /// The client is assumed muted until the button says otherwise.
    fn default() -> Self {
        Self { muted: true }
    }
}

pub struct MuteDispatcher {
    state: MuteState,
    policy: CallFailurePolicy,
    calls: u64,
    failed_calls: u64,
}

impl MuteDispatcher {
    pub fn new(policy: CallFailurePolicy) -> Self {
        Self {
            state: MuteState::default(),
            policy,
            calls: 0,
            failed_calls: 0,
        }
    }

    pub fn state(&self) -> MuteState {
        self.state
    }

    pub fn is_muted(&self) -> bool {
        self.state.muted
    }

    /// Voice calls attempted so far, successful or not.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn failed_calls(&self) -> u64 {
        self.failed_calls
    }

    /// Apply one monitor sample.  Returns the voice command issued, if any.
    ///
    /// LED write failures are always returned.  Voice call failures are
    /// returned only under [`CallFailurePolicy::Propagate`]; otherwise they
    /// are logged and the mute flag still follows the button.
    pub fn on_signal<L, V>(
        &mut self,
        signal: &LogicalSignal,
        led: &mut TalkLed<L>,
        voice: &V,
    ) -> Result<Option<VoiceCommand>>
    where
        L: OutputPin<Error = PinError>,
        V: VoiceClient + ?Sized,
    {
        let pressed = signal.debounced.is_pressed();
        led.set(pressed)?;

        // muted == pressed means the channel disagrees with the button.
        if self.state.muted != pressed {
            return Ok(None);
        }
        let command = if pressed {
            VoiceCommand::Unmute
        } else {
            VoiceCommand::Mute
        };

        self.calls += 1;
        let outcome = voice.execute(command);
        self.state.muted = !pressed;
        debug!(
            "voice client {}",
            if self.state.muted { "MUTE" } else { "UNMUTE" }
        );

        if let Err(e) = outcome {
            self.failed_calls += 1;
            match self.policy {
                CallFailurePolicy::LogAndContinue => error!("{}", e),
                CallFailurePolicy::Propagate => return Err(e.into()),
            }
        }
        Ok(Some(command))
    }
}
