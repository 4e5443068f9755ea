//! Supervisor lifecycle: start, liveness, terminate.

use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use rokku_bridge::adapters::config_file::JsonFileConfig;
use rokku_bridge::app::ports::ConfigPort;
use rokku_bridge::config::BridgeConfig;
use rokku_bridge::supervisor::{self, ExitStatus};

#[test]
fn terminate_blocks_until_unit_has_exited() {
    let (done_tx, done_rx) = mpsc::channel();
    let mut unit = supervisor::start("worker", move |interrupt| {
        while !interrupt.sleep(Duration::from_millis(5)) {}
        // Simulated cleanup that must finish before terminate returns.
        std::thread::sleep(Duration::from_millis(20));
        done_tx.send(()).unwrap();
        Ok(())
    })
    .unwrap();

    assert!(unit.is_alive());
    assert_eq!(unit.name(), "worker");
    assert_eq!(unit.terminate(), ExitStatus::Interrupted);
    assert!(done_rx.try_recv().is_ok(), "cleanup finished before terminate returned");
}

#[test]
fn liveness_clears_when_routine_returns() {
    let mut unit = supervisor::start("one-shot", |_| Ok(())).unwrap();
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while unit.is_alive() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert!(!unit.is_alive());
    assert_eq!(unit.join(), ExitStatus::Completed);
}

#[test]
fn external_interrupt_handle_stops_unit() {
    let mut unit = supervisor::start("signalled", |interrupt| {
        while !interrupt.sleep(Duration::from_millis(5)) {}
        Ok(())
    })
    .unwrap();
    unit.interrupt();
    assert_eq!(unit.join(), ExitStatus::Interrupted);
}

#[test]
fn bounded_terminate_returns_status_when_unit_cooperates() {
    let unit = supervisor::start("polite", |interrupt| {
        while !interrupt.sleep(Duration::from_millis(5)) {}
        Ok(())
    })
    .unwrap();
    assert_eq!(
        unit.terminate_timeout(Duration::from_secs(2)),
        Ok(ExitStatus::Interrupted)
    );
}

#[test]
fn togglemute_unit_process_cleans_up_on_sigint() {
    let path = std::env::temp_dir().join(format!("rokku-unit-{}.json", std::process::id()));
    let config = BridgeConfig {
        poll_interval_ms: 10,
        ..BridgeConfig::bench()
    };
    JsonFileConfig::new(&path).save(&config).unwrap();

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_rokku-bridge"));
    cmd.args(["unit", "togglemute"]).arg(&path).stderr(Stdio::piped());
    let mut unit = supervisor::spawn("togglemute process", cmd).unwrap();

    let stderr = unit.take_stderr().unwrap();
    let (line_tx, lines) = mpsc::channel();
    thread::spawn(move || {
        for line in BufReader::new(stderr).lines().map_while(Result::ok) {
            let _ = line_tx.send(line);
        }
    });
    // The SIGINT handler is in place once the unit reports it is running.
    loop {
        let line = lines
            .recv_timeout(Duration::from_secs(10))
            .expect("unit process never started");
        if line.contains("running (pid") {
            break;
        }
    }

    assert_eq!(
        unit.terminate_timeout(Duration::from_secs(5)),
        Ok(ExitStatus::Interrupted)
    );
    let rest: Vec<String> = lines.iter().collect();
    assert!(
        rest.iter().any(|l| l.contains("interrupted, cleanup done")),
        "{rest:#?}"
    );
    std::fs::remove_file(path).unwrap();
}
