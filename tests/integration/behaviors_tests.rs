//! Alarm behavior driven end to end through the pub/sub bridge.

use std::sync::Arc;

use crate::mock_hw::{recv, wait_until};

use rokku_bridge::adapters::local_broker::LocalBroker;
use rokku_bridge::adapters::sim_gpio::SimBoard;
use rokku_bridge::app::ports::Transport;
use rokku_bridge::behaviors::{self, BehaviorPins, alarm};
use rokku_bridge::gpio::{Level, PinId};
use rokku_bridge::pubsub::{self, Publisher};
use rokku_bridge::supervisor::{self, ExitStatus};

const BUZZER: PinId = PinId(24);

#[test]
fn alarm_on_then_off_publishes_both_states() {
    let broker = Arc::new(LocalBroker::new());
    let out = broker.subscribe("ns/in_to_out").unwrap();
    let publisher = Publisher::new(broker, "ns/in_to_out".into());
    let board = SimBoard::new();
    let gpio = board.scope();

    alarm(&publisher, &gpio, true).unwrap();
    alarm(&publisher, &gpio, false).unwrap();

    assert_eq!(recv(&out), r#"["alarm",true]"#);
    assert_eq!(recv(&out), r#"["alarm",false]"#);
    assert!(out.try_recv().is_err());
}

#[test]
fn inbound_alarm_request_sounds_buzzer_and_is_echoed() {
    let broker = Arc::new(LocalBroker::new());
    let (publisher, inbound, listener) =
        pubsub::setup(broker.clone(), "ns", "in_to_out", "out_to_in")
            .unwrap()
            .into_parts();
    let out = broker.subscribe("ns/in_to_out").unwrap();

    let board = SimBoard::new();
    let gpio = board.scope();
    let unit = supervisor::start("behaviors", move |interrupt| {
        behaviors::serve(&inbound, &publisher, &gpio, BehaviorPins::default(), &interrupt)
    })
    .unwrap();

    broker.publish("ns/out_to_in", r#"["volume",3]"#).unwrap();
    broker.publish("ns/out_to_in", r#"["alarm",true]"#).unwrap();
    assert_eq!(recv(&out), r#"["alarm",true]"#);
    wait_until("buzzer on", || board.level(BUZZER) == Level::High);

    broker.publish("ns/out_to_in", r#"["alarm",false]"#).unwrap();
    assert_eq!(recv(&out), r#"["alarm",false]"#);

    assert_eq!(unit.terminate(), ExitStatus::Interrupted);
    assert!(board.is_neutral(BUZZER));
    listener.terminate();
}
