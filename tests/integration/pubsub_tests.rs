//! Pub/sub bridge isolation and teardown.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::mock_hw::recv;

use rokku_bridge::adapters::local_broker::LocalBroker;
use rokku_bridge::app::ports::Transport;
use rokku_bridge::pubsub::{self, hash_prefix, topic};

#[test]
fn distinct_namespaces_never_cross_deliver() {
    let broker = Arc::new(LocalBroker::new());
    let prefix_a = hash_prefix("Rokku/suite_a");
    let prefix_b = hash_prefix("Rokku/suite_b");
    assert_ne!(prefix_a, prefix_b);

    let a = pubsub::setup(broker.clone(), &prefix_a, "in_to_out", "out_to_in").unwrap();
    let b = pubsub::setup(broker.clone(), &prefix_b, "in_to_out", "out_to_in").unwrap();

    broker.publish(&topic(&prefix_a, "out_to_in"), "for a").unwrap();
    broker.publish(&topic(&prefix_b, "out_to_in"), "for b").unwrap();

    assert_eq!(recv(&a.inbound), "for a");
    assert_eq!(recv(&b.inbound), "for b");
    std::thread::sleep(Duration::from_millis(100));

    assert!(a.teardown().is_empty());
    assert!(b.teardown().is_empty());
}

#[test]
fn same_namespace_is_shared() {
    let broker = Arc::new(LocalBroker::new());
    let prefix = hash_prefix("Rokku/shared");
    let bridge = pubsub::setup(broker.clone(), &prefix, "in_to_out", "out_to_in").unwrap();
    // A peer on the other side of the same namespace.
    let peer = pubsub::setup(broker, &prefix, "out_to_in", "in_to_out").unwrap();

    bridge.publisher.publish("hello peer").unwrap();
    assert_eq!(recv(&peer.inbound), "hello peer");
    peer.publisher.publish("hello bridge").unwrap();
    assert_eq!(recv(&bridge.inbound), "hello bridge");

    bridge.teardown();
    peer.teardown();
}

#[test]
fn listener_stops_forwarding_after_teardown() {
    let broker = Arc::new(LocalBroker::new());
    let (_publisher, inbound, listener) = pubsub::setup(broker.clone(), "ns", "out", "in")
        .unwrap()
        .into_parts();
    listener.terminate();

    broker.publish("ns/in", "late").unwrap();
    assert!(inbound.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn two_consumers_share_one_inbound_queue() {
    const COUNT: usize = 200;
    let broker = Arc::new(LocalBroker::new());
    let (_publisher, inbound, listener) = pubsub::setup(broker.clone(), "ns", "out", "in")
        .unwrap()
        .into_parts();

    let consumers: Vec<_> = (0..2)
        .map(|_| {
            let queue = inbound.clone();
            thread::spawn(move || {
                let mut seen = Vec::new();
                while let Ok(msg) = queue.recv_timeout(Duration::from_millis(500)) {
                    seen.push(msg);
                }
                seen
            })
        })
        .collect();

    for i in 0..COUNT {
        broker.publish("ns/in", &i.to_string()).unwrap();
    }

    let mut total = 0;
    let mut distinct = BTreeSet::new();
    for consumer in consumers {
        let seen = consumer.join().unwrap();
        total += seen.len();
        distinct.extend(seen);
    }
    listener.terminate();

    assert_eq!(total, COUNT, "no message duplicated");
    assert_eq!(distinct.len(), COUNT, "no message lost");
    assert!(pubsub::drain(&inbound).is_empty());
}
