//! Pub/sub bridge: a publisher plus a supervised inbound listener bound to
//! one topic namespace.
//!
//! ```text
//!   Publisher ──▶ <prefix>/<publish_suffix>
//!   <prefix>/<subscribe_suffix> ──▶ [ listener unit ] ──▶ inbound queue
//! ```
//!
//! The listener is either a thread ([`setup`]) or a child process
//! ([`setup_process`]) that runs [`listen`] and writes one JSON string per
//! line on its stdout.  Either way the inbound queue is multi-consumer.
//!
//! The prefix is usually [`hash_prefix`] of a human-readable namespace so
//! that several logical groups (e.g. concurrent test suites) can share one
//! transport without hearing each other.

use std::fmt::Write as _;
use std::io::{self, BufRead, BufReader, Read, Write as _};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, error, trace, warn};
use serde::Serialize;

use crate::app::events::BehaviorRecord;
use crate::app::ports::{Transport, TransportError};
use crate::error::Result;
use crate::supervisor::{self, Interrupt, SupervisedProcess};

/// How often the listener checks its interrupt while the topic is quiet.
const LISTEN_POLL: Duration = Duration::from_millis(50);

/// Line a listener process writes once its subscription is live.
const READY_LINE: &str = "null";

/// Deterministic, collision-resistant topic prefix for `namespace`
/// (lower-case hex SHA-256).
pub fn hash_prefix(namespace: &str) -> String {
    let digest = hmac_sha256::Hash::hash(namespace.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

/// `<prefix>/<suffix>`.
pub fn topic(prefix: &str, suffix: &str) -> String {
    format!("{prefix}/{suffix}")
}

// ───────────────────────────────────────────────────────────────
// Publisher
// ───────────────────────────────────────────────────────────────

/// Publish handle bound to one topic.  Cheap to clone.
#[derive(Clone)]
pub struct Publisher {
    transport: Arc<dyn Transport>,
    topic: String,
}

impl Publisher {
    pub fn new(transport: Arc<dyn Transport>, topic: String) -> Self {
        Self { transport, topic }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn publish(&self, payload: &str) -> Result<()> {
        trace!("publish {} {}", self.topic, payload);
        self.transport.publish(&self.topic, payload)?;
        Ok(())
    }

    /// Publish `[name, state]`.
    pub fn publish_record(&self, name: &str, state: impl Serialize) -> Result<()> {
        self.publish(&BehaviorRecord::new(name, state)?.encode()?)
    }
}

// ───────────────────────────────────────────────────────────────
// Binding
// ───────────────────────────────────────────────────────────────

/// Everything [`setup`] creates.  Dropping it does **not** stop the
/// listener; call [`PubSubBinding::teardown`] or terminate the listener.
pub struct PubSubBinding {
    pub prefix: String,
    pub publisher: Publisher,
    pub inbound: Receiver<String>,
    pub listener: SupervisedProcess,
}

impl PubSubBinding {
    /// Split into `(publisher, inbound_queue, listener)`.
    pub fn into_parts(self) -> (Publisher, Receiver<String>, SupervisedProcess) {
        (self.publisher, self.inbound, self.listener)
    }

    /// Stop forwarding and hand back whatever was still queued.
    pub fn teardown(self) -> Vec<String> {
        self.listener.terminate();
        drain(&self.inbound)
    }
}

/// Take every message currently queued without blocking.
pub fn drain(inbound: &Receiver<String>) -> Vec<String> {
    inbound.try_iter().collect()
}

/// Bind a publisher to `prefix/publish_suffix` and start a listener that
/// forwards everything on `prefix/subscribe_suffix` into the inbound queue.
///
/// The subscription is made before the listener starts, so nothing
/// published after `setup` returns can be missed.  Returns `None`, after
/// logging at error level, if the subscription or the listener fails.
pub fn setup(
    transport: Arc<dyn Transport>,
    prefix: &str,
    publish_suffix: &str,
    subscribe_suffix: &str,
) -> Option<PubSubBinding> {
    let sub_topic = topic(prefix, subscribe_suffix);
    let subscription = match transport.subscribe(&sub_topic) {
        Ok(rx) => rx,
        Err(e) => {
            error!("unable to subscribe to {}: {}", sub_topic, e);
            return None;
        }
    };

    let (inbound_tx, inbound) = crossbeam_channel::unbounded();
    let listener_name = format!("listen {subscribe_suffix}");
    let listener = supervisor::start(&listener_name, move |interrupt| {
        loop {
            match subscription.recv_timeout(LISTEN_POLL) {
                Ok(msg) => {
                    debug!("{} <- {}", sub_topic, msg);
                    if inbound_tx.send(msg).is_err() {
                        // Nobody left to consume.
                        return Ok(());
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(TransportError::Disconnected.into());
                }
            }
            if interrupt.is_raised() {
                return Ok(());
            }
        }
    })?;

    Some(PubSubBinding {
        prefix: prefix.to_owned(),
        publisher: Publisher::new(transport, topic(prefix, publish_suffix)),
        inbound,
        listener,
    })
}

// ───────────────────────────────────────────────────────────────
// Listener process
// ───────────────────────────────────────────────────────────────

fn write_line(out: &mut impl io::Write, line: &str) -> io::Result<()> {
    writeln!(out, "{line}")?;
    out.flush()
}

/// Body of a listener unit process: subscribe to `sub_topic` and write
/// every payload to `out` as one JSON string per line.
///
/// A `null` line is written first, once the subscription is live.  Returns
/// when interrupted or when the reading end of `out` goes away.
pub fn listen<W: io::Write>(
    transport: &dyn Transport,
    sub_topic: &str,
    out: &mut W,
    interrupt: &Interrupt,
) -> Result<()> {
    let subscription = transport.subscribe(sub_topic)?;
    if write_line(out, READY_LINE).is_err() {
        return Ok(());
    }
    while !interrupt.is_raised() {
        match subscription.recv_timeout(LISTEN_POLL) {
            Ok(msg) => {
                debug!("{} <- {}", sub_topic, msg);
                if write_line(out, &serde_json::to_string(&msg)?).is_err() {
                    debug!("listener output closed");
                    return Ok(());
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(TransportError::Disconnected.into());
            }
        }
    }
    Ok(())
}

/// Decode a listener's stdout into the inbound queue until the pipe closes.
fn forward_lines(stdout: impl Read, ready: &Sender<()>, inbound: &Sender<String>) {
    for line in BufReader::new(stdout).lines() {
        let Ok(line) = line else { break };
        match serde_json::from_str::<Option<String>>(&line) {
            Ok(None) => {
                let _ = ready.try_send(());
            }
            Ok(Some(msg)) => {
                if inbound.send(msg).is_err() {
                    break;
                }
            }
            Err(e) => warn!("listener wrote {:?}: {}", line, e),
        }
    }
    debug!("listener pipe closed");
}

/// Like [`setup`], but the listener is a child process running
/// `listener`, normally this binary's `unit listen` subcommand.
///
/// Waits up to `ready_timeout` for the child to report its subscription,
/// so nothing published after `setup_process` returns can be missed.
/// Returns `None`, after logging at error level, if the child cannot be
/// started or never becomes ready.
pub fn setup_process(
    transport: Arc<dyn Transport>,
    prefix: &str,
    publish_suffix: &str,
    subscribe_suffix: &str,
    mut listener: Command,
    ready_timeout: Duration,
) -> Option<PubSubBinding> {
    listener.stdout(Stdio::piped());
    let mut unit = supervisor::spawn(&format!("listen {subscribe_suffix}"), listener)?;
    let Some(stdout) = unit.take_stdout() else {
        error!("{}: no stdout pipe", unit.name());
        unit.terminate();
        return None;
    };

    let (inbound_tx, inbound) = crossbeam_channel::unbounded();
    let (ready_tx, ready) = crossbeam_channel::bounded(1);
    let pump = thread::Builder::new()
        .name(format!("pipe {subscribe_suffix}"))
        .spawn(move || forward_lines(stdout, &ready_tx, &inbound_tx));
    let started = match pump {
        Ok(_) => ready.recv_timeout(ready_timeout).is_ok(),
        Err(e) => {
            error!("unable to read {}: {}", unit.name(), e);
            false
        }
    };
    if !started {
        error!("{} did not subscribe within {:?}", unit.name(), ready_timeout);
        if let Err(e) = unit.terminate_timeout(ready_timeout) {
            warn!("listener teardown: {}", e);
        }
        return None;
    }

    Some(PubSubBinding {
        prefix: prefix.to_owned(),
        publisher: Publisher::new(transport, topic(prefix, publish_suffix)),
        inbound,
        listener: unit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::local_broker::LocalBroker;

    #[test]
    fn hash_prefix_is_deterministic_hex() {
        let a = hash_prefix("Rokku/test_topic");
        assert_eq!(a, hash_prefix("Rokku/test_topic"));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, hash_prefix("Rokku/other_topic"));
    }

    #[test]
    fn sha256_of_empty_namespace() {
        assert_eq!(
            hash_prefix(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn topic_joins_with_slash() {
        assert_eq!(topic("abc", "in_to_out"), "abc/in_to_out");
    }

    #[test]
    fn forwards_inbound_and_publishes_outbound() {
        let broker = Arc::new(LocalBroker::new());
        let binding = setup(broker.clone(), "ns", "out", "in").unwrap();
        let outbound = broker.subscribe("ns/out").unwrap();

        binding.publisher.publish("ping").unwrap();
        assert_eq!(outbound.recv_timeout(Duration::from_secs(1)).unwrap(), "ping");

        broker.publish("ns/in", "pong").unwrap();
        assert_eq!(
            binding.inbound.recv_timeout(Duration::from_secs(1)).unwrap(),
            "pong"
        );
        assert!(binding.teardown().is_empty());
    }

    #[test]
    fn teardown_keeps_unconsumed_messages() {
        let broker = Arc::new(LocalBroker::new());
        let (publisher, inbound, listener) =
            setup(broker.clone(), "ns", "out", "in").unwrap().into_parts();
        broker.publish("ns/in", "one").unwrap();
        broker.publish("ns/in", "two").unwrap();
        // Wait for the listener to forward both before stopping it.
        let first = inbound.recv_timeout(Duration::from_secs(1)).unwrap();
        let second = inbound.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!((first.as_str(), second.as_str()), ("one", "two"));

        broker.publish("ns/in", "three").unwrap();
        std::thread::sleep(LISTEN_POLL * 2);
        listener.terminate();
        assert_eq!(drain(&inbound), vec!["three".to_owned()]);
        assert_eq!(publisher.topic(), "ns/out");
    }

    #[test]
    fn invalid_topic_is_setup_failure() {
        let broker = Arc::new(LocalBroker::new());
        assert!(setup(broker, "ns", "out", "#").is_none());
    }

    fn shell(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn listen_writes_ready_then_json_lines() {
        let broker = Arc::new(LocalBroker::new());
        let interrupt = Interrupt::new();
        let worker = {
            let broker = broker.clone();
            let interrupt = interrupt.clone();
            thread::spawn(move || {
                let mut out = Vec::new();
                listen(&*broker, "ns/in", &mut out, &interrupt).unwrap();
                out
            })
        };
        while broker.subscribers("ns/in") == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        broker.publish("ns/in", r#"["alarm",true]"#).unwrap();
        thread::sleep(LISTEN_POLL * 2);
        interrupt.raise();

        let out = String::from_utf8(worker.join().unwrap()).unwrap();
        assert_eq!(out, "null\n\"[\\\"alarm\\\",true]\"\n");
    }

    #[test]
    fn process_listener_feeds_the_inbound_queue() {
        let broker = Arc::new(LocalBroker::new());
        let script = r#"echo null; echo '"one"'; echo 'not json'; echo '"two"'; exec sleep 30"#;
        let ready_timeout = Duration::from_secs(2);
        let binding =
            setup_process(broker, "ns", "out", "in", shell(script), ready_timeout).unwrap();
        assert!(binding.listener.pid().is_some());
        let timeout = Duration::from_secs(1);
        assert_eq!(binding.inbound.recv_timeout(timeout).unwrap(), "one");
        assert_eq!(binding.inbound.recv_timeout(timeout).unwrap(), "two");
        assert!(binding.teardown().is_empty());
    }

    #[test]
    fn silent_listener_process_is_setup_failure() {
        let broker = Arc::new(LocalBroker::new());
        let quiet = shell("exec sleep 30");
        let ready_timeout = Duration::from_millis(100);
        assert!(setup_process(broker, "ns", "out", "in", quiet, ready_timeout).is_none());
    }
}
