//! Mock collaborators for integration tests.
//!
//! Records every voice client call so tests can assert on the full
//! command history without a Mumble install.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use rokku_bridge::app::commands::VoiceCommand;
use rokku_bridge::app::ports::VoiceClient;
use rokku_bridge::error::VoiceCallError;

// ── RecordingVoice ────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingVoice {
    calls: Arc<Mutex<Vec<VoiceCommand>>>,
    fail: bool,
}

#[allow(dead_code)]
impl RecordingVoice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call is recorded and then reported as a non-zero exit.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<VoiceCommand> {
        self.calls.lock().unwrap().clone()
    }
}

impl VoiceClient for RecordingVoice {
    fn execute(&self, command: VoiceCommand) -> Result<(), VoiceCallError> {
        self.calls.lock().unwrap().push(command);
        if self.fail {
            Err(VoiceCallError::Exit {
                command,
                code: Some(1),
            })
        } else {
            Ok(())
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────

/// Poll `cond` for up to two seconds.
pub fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return;
        }
        thread::sleep(Duration::from_millis(2));
    }
    panic!("timed out waiting for {what}");
}

/// Next message on `rx`, or panic after a second.
pub fn recv(rx: &Receiver<String>) -> String {
    rx.recv_timeout(Duration::from_secs(1))
        .expect("expected a message")
}
