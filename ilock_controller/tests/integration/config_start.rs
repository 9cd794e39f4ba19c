//! Controller construction from configuration files and bus bring-up.

use std::fs;
use std::path::{Path, PathBuf};

use ilock_bus::transports::loopback::{LoopbackTransport, pair};
use ilock_bus::{BusMessage, BusSettings, Dispatch, Filter, Message, MessageId, Transport};
use ilock_common::config::{ConfigError, ConfigLoader, ControllerConfig};
use ilock_common::types::{LeverState, LockState, ModuleType};
use ilock_bus::message::{SetLeverState, SetLockState};
use ilock_controller::{Controller, ControllerError};
use ilock_engine::EngineError;
use tempfile::TempDir;

fn write_config(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("controller.toml");
    fs::write(
        &path,
        format!(
            r#"{body}

[shared]
service_name = "ilock-test"

[bus]
transport = "loopback"
poll_interval_us = 0
"#
        ),
    )
    .unwrap();
    path
}

fn load(path: &Path) -> Result<Controller, ControllerError> {
    let config = ControllerConfig::load(path)?;
    Controller::from_config(&config, path.parent().unwrap())
}

fn lever_module(endpoint: LoopbackTransport, address: u8) -> LoopbackTransport {
    let mut endpoint = endpoint;
    endpoint.configure(Filter::new(ModuleType::Lever, address), &BusSettings::default());
    endpoint.start().unwrap();
    endpoint
}

fn drain(endpoint: &mut LoopbackTransport) -> Vec<(u8, Message)> {
    std::iter::from_fn(|| endpoint.read())
        .map(|f| {
            (
                MessageId::unpack(f.id()).destination,
                Message::from_frame(&f).unwrap(),
            )
        })
        .collect()
}

/// Test: a single reversed lever gets exactly one reply, to its own module.
#[test]
fn reversed_lever_gets_one_reply() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(
        tmp.path(),
        r#"
[[levers]]
name = "1"
device = 5
slot = 0
"#,
    );
    let mut controller = load(&path).unwrap();
    let (a, b) = pair();
    let mut module = lever_module(b, 5);
    controller.start(Box::new(a)).unwrap();
    drain(&mut module);

    let report = SetLeverState {
        device_id: 5,
        slot: 0,
        state: LeverState::Reversed,
        faulted: true,
    };
    module.write(&report.to_frame(0).unwrap()).unwrap();
    controller.poll();

    assert_eq!(
        drain(&mut module),
        vec![(
            5,
            Message::SetLockState(SetLockState {
                slot: 0,
                state: LockState::Off,
                locked: false,
            })
        )]
    );
    assert_eq!(controller.interlocking().faulted_count(), 0);

    // Same position again is not news.
    module.write(&report.to_frame(0).unwrap()).unwrap();
    controller.poll();
    assert!(drain(&mut module).is_empty());
}

/// Test: lever reports from unbound slots are dropped silently.
#[test]
fn unbound_slot_is_ignored() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(
        tmp.path(),
        r#"
[[levers]]
name = "1"
device = 5
slot = 0
"#,
    );
    let mut controller = load(&path).unwrap();
    let (a, b) = pair();
    let mut module = lever_module(b, 5);
    controller.start(Box::new(a)).unwrap();
    drain(&mut module);

    let report = SetLeverState {
        device_id: 5,
        slot: 3,
        state: LeverState::Reversed,
        faulted: false,
    };
    module.write(&report.to_frame(0).unwrap()).unwrap();
    assert_eq!(
        controller.poll(),
        Dispatch::Handled(ilock_bus::MessageType::SetLeverState)
    );
    assert!(drain(&mut module).is_empty());
}

/// Test: a short SetLeverState payload is dropped without touching the engine.
#[test]
fn malformed_report_is_dropped() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(
        tmp.path(),
        r#"
[[levers]]
name = "1"
device = 5
slot = 0
"#,
    );
    let mut controller = load(&path).unwrap();
    let (a, b) = pair();
    let mut module = lever_module(b, 5);
    controller.start(Box::new(a)).unwrap();
    drain(&mut module);

    let id = MessageId::new(ModuleType::Core, 0, ilock_bus::MessageType::SetLeverState);
    module
        .write(&ilock_bus::Frame::new(id.pack(), &[5, 0, 1]).unwrap())
        .unwrap();
    assert_eq!(
        controller.poll(),
        Dispatch::Malformed(ilock_bus::MessageType::SetLeverState)
    );
    assert!(drain(&mut module).is_empty());
    assert_eq!(
        controller.interlocking().id_of("1").and_then(|id| controller
            .interlocking()
            .locking(id)
            .map(|l| l.state())),
        Some(LockState::On)
    );
}

/// Test: a JSON layout next to the controller file builds the same frame.
#[test]
fn json_layout_file() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("frame.json"),
        r#"{
  "Levers": [
    {"Name": "1", "Device": 5, "Slot": 0},
    {"Name": "2", "Device": 6, "Slot": 0}
  ],
  "Interlocking": [
    {"Acting": "1", "Affecting": ["2"], "Locking": {"StateOn": "LockedAny", "StateOff": "Unlocked"}}
  ]
}"#,
    )
    .unwrap();
    let path = write_config(tmp.path(), r#"layout_file = "frame.json""#);

    let controller = load(&path).unwrap();
    assert_eq!(controller.bindings().len(), 2);
    let two = controller.interlocking().id_of("2").unwrap();
    assert!(controller.interlocking().locking(two).unwrap().is_locked());
    assert!(controller.levers().lever(controller.bindings()[1].slot).unwrap().lever_locked);
}

/// Test: a missing layout file surfaces as a configuration error.
#[test]
fn missing_layout_file() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(tmp.path(), r#"layout_file = "absent.toml""#);
    assert!(matches!(
        load(&path),
        Err(ControllerError::Config(ConfigError::FileNotFound))
    ));
}

/// Test: a rule naming an undeclared lever is rejected by the engine.
#[test]
fn rule_for_unknown_lever() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(
        tmp.path(),
        r#"
[[levers]]
name = "1"
device = 5
slot = 0

[[locking]]
acting = "1"
affecting = ["9"]
state_on = "LockedAny"
state_off = "Unlocked"
"#,
    );
    match load(&path) {
        Err(ControllerError::Engine(EngineError::LeverNotFound(name))) => assert_eq!(name, "9"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("layout with unknown lever accepted"),
    }
}

/// Test: a transport that refuses to start leaves the controller stopped.
#[test]
fn failed_transport_start() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(tmp.path(), "");
    let mut controller = load(&path).unwrap();
    let (a, _b) = pair();

    assert!(matches!(
        controller.start(Box::new(a.failing_start())),
        Err(ControllerError::Bus(_))
    ));
    assert!(!controller.is_started());
    assert_eq!(controller.poll(), Dispatch::Idle);
}
