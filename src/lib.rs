//! Rokku intercom bridge library.
//!
//! Connects a physical talk button, talk LED and buzzer to a voice client
//! and a topic-based pub/sub bus.  Everything hardware-facing sits behind
//! the [`gpio::GpioPort`] and [`app::ports`] traits so the bridge routines
//! run unchanged against the in-memory board in tests.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod behaviors;
pub mod config;
pub mod dispatcher;
pub mod drivers;
pub mod error;
pub mod gpio;
pub mod monitor;
pub mod pins;
pub mod pubsub;
pub mod supervisor;
pub mod togglemute;

pub use error::{Error, Result};
