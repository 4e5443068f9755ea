//! Commands the bridge sends to the voice chat client.

use core::fmt;

/// Typed voice-client RPC.  Mapped to a fixed argument list, never to a
/// shell string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceCommand {
    Mute,
    Unmute,
}

impl VoiceCommand {
    /// Arguments passed to the client program.
    pub fn args(self) -> [&'static str; 2] {
        match self {
            Self::Mute => ["rpc", "mute"],
            Self::Unmute => ["rpc", "unmute"],
        }
    }
}

impl fmt::Display for VoiceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [verb, action] = self.args();
        write!(f, "{verb} {action}")
    }
}
