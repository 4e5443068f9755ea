//! Active buzzer driver.
//!
//! The buzzer has its own oscillator, so driving the line HIGH is all it
//! takes to sound it.  State is tracked in [`BuzzerState`] alongside the
//! pin so callers can report it without reading the line back.

use embedded_hal::digital::OutputPin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuzzerState {
    pub sounding: bool,
}

pub struct Buzzer<P> {
    pin: P,
    state: BuzzerState,
}

impl<P: OutputPin> Buzzer<P> {
    /// Bind to an output pin and make sure the buzzer starts silent.
    pub fn new(mut pin: P) -> Result<Self, P::Error> {
        pin.set_low()?;
        Ok(Self {
            pin,
            state: BuzzerState::default(),
        })
    }

    pub fn sound(&mut self) -> Result<(), P::Error> {
        self.pin.set_high()?;
        self.state.sounding = true;
        Ok(())
    }

    pub fn silence(&mut self) -> Result<(), P::Error> {
        self.pin.set_low()?;
        self.state.sounding = false;
        Ok(())
    }

    pub fn state(&self) -> BuzzerState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sim_gpio::SimBoard;
    use crate::gpio::{GpioPort, Level, PinId};

    #[test]
    fn sound_and_silence() {
        let board = SimBoard::new();
        let mut buzzer = Buzzer::new(board.scope().output(PinId(24)).unwrap()).unwrap();
        assert!(!buzzer.state().sounding);

        buzzer.sound().unwrap();
        assert!(buzzer.state().sounding);
        assert_eq!(board.level(PinId(24)), Level::High);

        buzzer.silence().unwrap();
        assert!(!buzzer.state().sounding);
        assert_eq!(board.level(PinId(24)), Level::Low);
    }
}
