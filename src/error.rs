//! Unified error types for the Rokku bridge.
//!
//! A single `Error` enum that every subsystem converts into, so the
//! supervised units can report a failure uniformly.  Subsystem errors are
//! `Copy` where they carry no heap data.

use core::fmt;
use std::io;

use crate::app::commands::VoiceCommand;
use crate::app::ports::{ConfigError, TransportError};
use crate::gpio::PinId;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the bridge funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A digital pin could not be configured, read, or written.
    Pin(PinError),
    /// The voice client command failed to run or exited non-zero.
    VoiceCall(VoiceCallError),
    /// The pub/sub transport rejected a publish or subscribe.
    Transport(TransportError),
    /// A supervised unit could not be started or stopped.
    Supervisor(SupervisorError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// A pub/sub payload could not be encoded or decoded.
    Payload(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pin(e) => write!(f, "pin: {e}"),
            Self::VoiceCall(e) => write!(f, "voice client: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Supervisor(e) => write!(f, "supervisor: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Payload(msg) => write!(f, "payload: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Pin errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinError {
    /// The line was used before `configure` was called on it.
    NotConfigured(PinId),
    /// A write was attempted on a line configured as input.
    WrongDirection(PinId),
    /// The backend cannot apply the requested pull resistor.
    BiasUnsupported(PinId),
    /// The underlying device or sysfs node failed.
    Io { pin: PinId, kind: io::ErrorKind },
}

impl fmt::Display for PinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured(pin) => write!(f, "{pin} is not configured"),
            Self::WrongDirection(pin) => write!(f, "{pin} is not an output"),
            Self::BiasUnsupported(pin) => write!(f, "{pin} pull resistor cannot be set"),
            Self::Io { pin, kind } => write!(f, "{pin} I/O failed ({kind})"),
        }
    }
}

impl embedded_hal::digital::Error for PinError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

impl From<PinError> for Error {
    fn from(e: PinError) -> Self {
        Self::Pin(e)
    }
}

// ---------------------------------------------------------------------------
// Voice client errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceCallError {
    /// The client program could not be launched at all.
    Spawn { command: VoiceCommand, kind: io::ErrorKind },
    /// The client ran but reported failure. `None` means killed by a signal.
    Exit { command: VoiceCommand, code: Option<i32> },
}

impl fmt::Display for VoiceCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn { command, kind } => write!(f, "{command} could not start ({kind})"),
            Self::Exit {
                command,
                code: Some(code),
            } => write!(f, "{command} exited with status {code}"),
            Self::Exit { command, code: None } => write!(f, "{command} killed by signal"),
        }
    }
}

impl From<VoiceCallError> for Error {
    fn from(e: VoiceCallError) -> Self {
        Self::VoiceCall(e)
    }
}

// ---------------------------------------------------------------------------
// Supervisor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorError {
    /// The OS refused to create the unit of execution.
    SpawnFailed(io::ErrorKind),
    /// The unit name cannot be used (empty or contains NUL).
    InvalidName,
    /// The unit did not exit within the bounded terminate window.
    TerminateTimedOut,
    /// SIGINT could not be delivered to a child unit.
    SignalFailed,
}

impl fmt::Display for SupervisorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpawnFailed(kind) => write!(f, "spawn failed ({kind})"),
            Self::InvalidName => write!(f, "invalid unit name"),
            Self::TerminateTimedOut => write!(f, "terminate timed out"),
            Self::SignalFailed => write!(f, "signal delivery failed"),
        }
    }
}

impl From<SupervisorError> for Error {
    fn from(e: SupervisorError) -> Self {
        Self::Supervisor(e)
    }
}

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Payload(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
