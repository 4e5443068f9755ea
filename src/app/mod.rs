//! Application core: bridge vocabulary and port traits.
//!
//! Commands sent to the voice client, events published on the bus, and
//! the **port traits** in [`ports`] that keep the bridge routines
//! testable without real peripherals, brokers or client programs.

pub mod commands;
pub mod events;
pub mod ports;
