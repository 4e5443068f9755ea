//! Toggle-mute bridge running as a supervised unit on the simulated board.

use std::sync::Arc;
use std::time::Duration;

use crate::mock_hw::{RecordingVoice, recv, wait_until};

use rokku_bridge::adapters::local_broker::LocalBroker;
use rokku_bridge::adapters::sim_gpio::SimBoard;
use rokku_bridge::app::commands::VoiceCommand;
use rokku_bridge::app::ports::Transport;
use rokku_bridge::config::CallFailurePolicy;
use rokku_bridge::gpio::{Level, PinId};
use rokku_bridge::pubsub::Publisher;
use rokku_bridge::supervisor::ExitStatus;
use rokku_bridge::togglemute::{ToggleMuteSettings, start_togglemute};

const BUTTON: PinId = PinId(16);
const LED: PinId = PinId(12);

fn settings() -> ToggleMuteSettings {
    ToggleMuteSettings {
        interval: Duration::from_millis(2),
        ..ToggleMuteSettings::default()
    }
}

#[test]
fn mute_changes_are_announced() {
    let broker = Arc::new(LocalBroker::new());
    let out = broker.subscribe("ns/in_to_out").unwrap();
    let publisher = Publisher::new(broker, "ns/in_to_out".into());
    let board = SimBoard::new();
    let voice = RecordingVoice::new();

    let unit = start_togglemute(board.scope(), voice.clone(), Some(publisher), settings()).unwrap();

    board.drive(BUTTON, Level::Low);
    assert_eq!(recv(&out), r#"["mute",false]"#);
    board.drive(BUTTON, Level::High);
    assert_eq!(recv(&out), r#"["mute",true]"#);

    assert_eq!(unit.terminate(), ExitStatus::Interrupted);
    assert_eq!(voice.calls(), vec![VoiceCommand::Unmute, VoiceCommand::Mute]);
}

#[test]
fn interrupt_mid_loop_cleans_up_once() {
    let board = SimBoard::new();
    let unit = start_togglemute(board.scope(), RecordingVoice::new(), None, settings()).unwrap();

    board.drive(BUTTON, Level::Low);
    wait_until("LED lit", || board.level(LED) == Level::High);

    assert_eq!(unit.terminate(), ExitStatus::Interrupted);
    assert_eq!(board.cleanups(), 1);
    assert!(board.is_neutral(BUTTON));
    assert!(board.is_neutral(LED));
}

#[test]
fn button_failure_mid_loop_fails_unit_and_resets_pins() {
    let board = SimBoard::new();
    let voice = RecordingVoice::new();
    let unit = start_togglemute(board.scope(), voice.clone(), None, settings()).unwrap();

    board.drive(BUTTON, Level::Low);
    wait_until("unmute", || !voice.calls().is_empty());
    board.inject_fault(BUTTON);

    match unit.join() {
        ExitStatus::Failed(reason) => assert!(reason.starts_with("pin:"), "{reason}"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(board.cleanups(), 1);
    assert!(board.is_neutral(LED));
}

#[test]
fn voice_failure_is_tolerated_by_default() {
    let board = SimBoard::new();
    let voice = RecordingVoice::failing();
    let mut unit = start_togglemute(board.scope(), voice.clone(), None, settings()).unwrap();

    board.drive(BUTTON, Level::Low);
    wait_until("unmute attempt", || voice.calls().len() == 1);
    board.drive(BUTTON, Level::High);
    wait_until("mute attempt", || voice.calls().len() == 2);

    assert!(unit.is_alive());
    assert_eq!(unit.terminate(), ExitStatus::Interrupted);
}

#[test]
fn voice_failure_stops_unit_under_propagate() {
    let board = SimBoard::new();
    let settings = ToggleMuteSettings {
        policy: CallFailurePolicy::Propagate,
        ..settings()
    };
    let unit = start_togglemute(board.scope(), RecordingVoice::failing(), None, settings).unwrap();

    board.drive(BUTTON, Level::Low);
    match unit.join() {
        ExitStatus::Failed(reason) => assert!(reason.contains("rpc unmute"), "{reason}"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(board.cleanups(), 1);
}
