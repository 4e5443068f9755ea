//! MQTT transport.
//!
//! Implements [`Transport`] over an MQTT broker with `rumqttc`'s blocking
//! client.  A background thread drives the connection and hands every
//! incoming publish to an in-process [`LocalBroker`], which fans it out to
//! the local subscribers of that exact topic.
//!
//! ```text
//!   publish ──▶ Client ──▶ broker
//!   broker ──▶ Connection (event thread) ──▶ LocalBroker ──▶ receivers
//! ```
//!
//! Every topic subscribed so far is subscribed again after a reconnect.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crossbeam_channel::Receiver;
use log::{debug, info, warn};
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};

use super::local_broker::{LocalBroker, validate_topic};
use crate::app::ports::{Transport, TransportError};

const KEEP_ALIVE: Duration = Duration::from_secs(5);
/// Pause between reconnect attempts while the broker is unreachable.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
/// How long `subscribe` waits for the broker to acknowledge.
const SUBACK_TIMEOUT: Duration = Duration::from_secs(5);
/// Outgoing request queue depth.
const REQUEST_CAPACITY: usize = 64;

/// Where and as whom to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    /// Must be unique per connected process.
    pub client_id: String,
}

/// Subscribe requests sent and acknowledged.  SUBACKs arrive in request
/// order, so `acked >= n` means the first `n` requests are live.
#[derive(Default)]
struct SubAcks {
    counts: Mutex<(u64, u64)>,
    cvar: Condvar,
}

impl SubAcks {
    fn requested(&self) -> u64 {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.0 += 1;
        counts.0
    }

    fn acked(&self) {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.1 += 1;
        self.cvar.notify_all();
    }

    /// Wait until request number `n` is acknowledged.
    fn wait_for(&self, n: u64, timeout: Duration) -> bool {
        let counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        let (counts, _) = self
            .cvar
            .wait_timeout_while(counts, timeout, |c| c.1 < n)
            .unwrap_or_else(PoisonError::into_inner);
        counts.1 >= n
    }
}

/// State shared with the event thread.
struct Shared {
    client: Mutex<Client>,
    routes: LocalBroker,
    topics: Mutex<BTreeSet<String>>,
    subacks: SubAcks,
    stop: AtomicBool,
}

impl Shared {
    fn send_subscribe(&self, topic: &str) -> Result<u64, TransportError> {
        let n = self.subacks.requested();
        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribe(topic, QoS::AtLeastOnce)
            .map_err(|e| {
                warn!("mqtt: subscribe {} failed: {}", topic, e);
                TransportError::Disconnected
            })?;
        Ok(n)
    }

    /// Runs on the event thread, so it must not block on a full request
    /// queue.
    fn resubscribe(&self) {
        let topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let client = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        for topic in topics {
            if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                warn!("mqtt: resubscribe {} failed: {}", topic, e);
                return;
            }
            self.subacks.requested();
        }
    }
}

pub struct MqttTransport {
    shared: Arc<Shared>,
}

impl MqttTransport {
    /// Start connecting to the broker.  The connection is made, and kept,
    /// by a background thread; publishes made while it is down are queued
    /// by the client.
    pub fn connect(settings: &MqttSettings) -> Result<Self, TransportError> {
        let mut options = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
        options.set_keep_alive(KEEP_ALIVE);
        let (client, connection) = Client::new(options, REQUEST_CAPACITY);

        let shared = Arc::new(Shared {
            client: Mutex::new(client),
            routes: LocalBroker::new(),
            topics: Mutex::new(BTreeSet::new()),
            subacks: SubAcks::default(),
            stop: AtomicBool::new(false),
        });
        let events = shared.clone();
        thread::Builder::new()
            .name(format!("mqtt {}", settings.client_id))
            .spawn(move || drive(connection, &events))
            .map_err(|e| {
                warn!("mqtt: event thread not started: {}", e);
                TransportError::Disconnected
            })?;
        info!(
            "mqtt: {} connecting to {}:{}",
            settings.client_id, settings.host, settings.port
        );
        Ok(Self { shared })
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        let disconnected = self
            .shared
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .disconnect();
        if let Err(e) = disconnected {
            debug!("mqtt: disconnect: {}", e);
        }
    }
}

/// Hand one incoming publish to local subscribers.
fn deliver(routes: &LocalBroker, topic: &str, payload: &[u8]) {
    match std::str::from_utf8(payload) {
        Ok(text) => {
            if let Err(e) = routes.publish(topic, text) {
                debug!("mqtt: {} not routed: {}", topic, e);
            }
        }
        Err(_) => warn!("mqtt: dropping non UTF-8 payload on {}", topic),
    }
}

/// Event thread body: runs until the transport is dropped.
fn drive(mut connection: Connection, shared: &Shared) {
    for event in connection.iter() {
        if shared.stop.load(Ordering::Acquire) {
            break;
        }
        match event {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                deliver(&shared.routes, &publish.topic, &publish.payload);
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("mqtt: connected");
                shared.resubscribe();
            }
            Ok(Event::Incoming(Packet::SubAck(_))) => shared.subacks.acked(),
            Ok(_) => {}
            Err(e) => {
                warn!("mqtt: {}, retrying", e);
                thread::sleep(RECONNECT_DELAY);
            }
        }
    }
    debug!("mqtt: event thread stopped");
}

impl Transport for MqttTransport {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), TransportError> {
        validate_topic(topic)?;
        self.shared
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .publish(topic, QoS::AtLeastOnce, false, payload.as_bytes().to_vec())
            .map_err(|e| {
                warn!("mqtt: publish {} failed: {}", topic, e);
                TransportError::Disconnected
            })
    }

    /// Returns once the broker has acknowledged the subscription.
    fn subscribe(&self, topic: &str) -> Result<Receiver<String>, TransportError> {
        let rx = self.shared.routes.subscribe(topic)?;
        let fresh = self
            .shared
            .topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(topic.to_owned());
        if fresh {
            let n = self.shared.send_subscribe(topic)?;
            if !self.shared.subacks.wait_for(n, SUBACK_TIMEOUT) {
                warn!("mqtt: no SUBACK for {} within {:?}", topic, SUBACK_TIMEOUT);
                return Err(TransportError::Disconnected);
            }
        }
        Ok(rx)
    }
}
