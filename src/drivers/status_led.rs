//! Talk LED driver.
//!
//! Single discrete LED on a push-pull output, HIGH = lit.  Mirrors the
//! talk button so the user sees when the channel is open.

use embedded_hal::digital::OutputPin;

pub struct TalkLed<P> {
    pin: P,
    lit: bool,
}

impl<P: OutputPin> TalkLed<P> {
    /// Wrap an output pin.  The pin is assumed to start low.
    pub fn new(pin: P) -> Self {
        Self { pin, lit: false }
    }

    pub fn set(&mut self, on: bool) -> Result<(), P::Error> {
        if on {
            self.pin.set_high()?;
        } else {
            self.pin.set_low()?;
        }
        self.lit = on;
        Ok(())
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }
}
