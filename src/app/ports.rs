//! Port traits: the hexagonal boundary between the bridge and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ bridge routines
//! ```
//!
//! The digital pin port lives in [`crate::gpio`] next to the pin types it
//! is expressed in.  Everything else the bridge talks to (voice client,
//! pub/sub transport, persistent configuration) is declared here.

use crossbeam_channel::Receiver;

use crate::config::BridgeConfig;
use crate::error::VoiceCallError;

use super::commands::VoiceCommand;

// ───────────────────────────────────────────────────────────────
// Voice client port (driven adapter: domain → voice chat client)
// ───────────────────────────────────────────────────────────────

/// Opaque RPC into the voice chat client.  Only success or failure of
/// the call is observed; no output is consumed.
pub trait VoiceClient: Send {
    fn execute(&self, command: VoiceCommand) -> Result<(), VoiceCallError>;
}

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: domain ↔ pub/sub broker)
// ───────────────────────────────────────────────────────────────

/// Publish/subscribe primitive the [`pubsub`](crate::pubsub) bridge is
/// built on.  Topics are plain strings matched exactly.
pub trait Transport: Send + Sync {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), TransportError>;

    /// Start receiving every payload later published on `topic`.  The
    /// receiver may be cloned to share the stream between consumers.
    fn subscribe(&self, topic: &str) -> Result<Receiver<String>, TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists bridge configuration.
///
/// Implementations MUST validate before persisting and after loading.
/// Invalid values are rejected with [`ConfigError::ValidationFailed`],
/// not clamped.
pub trait ConfigPort {
    /// Returns [`ConfigError::NotFound`] if nothing is stored yet.
    fn load(&self) -> Result<BridgeConfig, ConfigError>;

    fn save(&self, config: &BridgeConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`Transport`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Topic is empty or contains a wildcard character.
    InvalidTopic,
    /// The broker side of the connection is gone.
    Disconnected,
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage.
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidTopic => write!(f, "invalid topic"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for TransportError {}

impl std::error::Error for ConfigError {}
