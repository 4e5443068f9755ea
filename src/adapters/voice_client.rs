//! Voice client adapter: runs the Mumble command-line RPC.
//!
//! `mumble rpc mute` / `mumble rpc unmute` talk to the already-running
//! client instance.  The command's exit status is the only result.

use std::process::{Command, Stdio};

use log::debug;

use crate::app::commands::VoiceCommand;
use crate::app::ports::VoiceClient;
use crate::error::VoiceCallError;

pub struct CommandLineVoiceClient {
    program: String,
}

impl CommandLineVoiceClient {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl VoiceClient for CommandLineVoiceClient {
    fn execute(&self, command: VoiceCommand) -> Result<(), VoiceCallError> {
        debug!("running {} {}", self.program, command);
        let status = Command::new(&self.program)
            .args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .map_err(|e| VoiceCallError::Spawn {
                command,
                kind: e.kind(),
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(VoiceCallError::Exit {
                command,
                code: status.code(),
            })
        }
    }
}
