//! Actuator drivers, written against the `embedded-hal` digital traits.

pub mod buzzer;
pub mod status_led;
