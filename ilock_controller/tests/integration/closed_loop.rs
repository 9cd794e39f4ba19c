//! Controller and simulated lever modules on one in-memory bus, using the
//! six-lever frame shipped in `config/`.
//!
//! Lever ids follow layout order: 1-3 on module 5, 4-6 on module 6.

use std::path::Path;

use ilock_bus::Dispatch;
use ilock_bus::transports::default_registry;
use ilock_bus::transports::loopback::LoopbackBus;
use ilock_common::config::{ConfigLoader, ControllerConfig};
use ilock_common::types::{DeviceId, LeverState, LockState, SlotId};
use ilock_controller::{Controller, LeverModuleSim};

struct Rig {
    controller: Controller,
    sims: Vec<LeverModuleSim>,
}

impl Rig {
    fn shipped_frame() -> Self {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/controller.toml");
        let config = ControllerConfig::load(&path).unwrap();
        let mut controller = Controller::from_config(&config, path.parent().unwrap()).unwrap();

        let bus = LoopbackBus::new();
        let mut sims = vec![LeverModuleSim::new(5, 3), LeverModuleSim::new(6, 3)];
        for sim in &mut sims {
            sim.start(Box::new(bus.endpoint())).unwrap();
        }
        controller.start_with_registry(&default_registry(&bus).unwrap()).unwrap();

        let mut rig = Self { controller, sims };
        rig.settle();
        rig
    }

    /// Poll everything until the bus is quiet.
    fn settle(&mut self) {
        loop {
            let mut busy = 0;
            for sim in &mut self.sims {
                busy += sim.poll_all();
            }
            while self.controller.poll() != Dispatch::Idle {
                busy += 1;
            }
            if busy == 0 {
                break;
            }
        }
    }

    fn sim(&self, address: DeviceId) -> &LeverModuleSim {
        self.sims.iter().find(|s| s.address() == address).unwrap()
    }

    fn locked(&self, address: DeviceId, slot: SlotId) -> bool {
        self.sim(address).slot(slot).unwrap().locked
    }

    /// Lock indicators as `[(5,0), (5,1), (5,2), (6,0), (6,1), (6,2)]`.
    fn indicators(&self) -> [bool; 6] {
        [
            self.locked(5, 0),
            self.locked(5, 1),
            self.locked(5, 2),
            self.locked(6, 0),
            self.locked(6, 1),
            self.locked(6, 2),
        ]
    }

    fn pull(&mut self, address: DeviceId, slot: SlotId, state: LeverState) {
        let sim = self
            .sims
            .iter_mut()
            .find(|s| s.address() == address)
            .unwrap();
        sim.move_lever(slot, state).unwrap();
        self.settle();
    }

    fn state(&self, name: &str) -> LockState {
        let il = self.controller.interlocking();
        il.locking(il.id_of(name).unwrap()).unwrap().state()
    }
}

const AT_REST: [bool; 6] = [true, true, false, false, true, true];

/// Test: startup registers both modules and lights the initial locks.
#[test]
fn startup_syncs_indicators() {
    let rig = Rig::shipped_frame();
    assert_eq!(rig.controller.levers().addresses(), &[5, 6]);
    assert_eq!(rig.indicators(), AT_REST);
    assert!(rig.sim(5).indication());
}

/// Test: pulling the points lock releases the home signals and locks the points.
#[test]
fn points_lock_releases_signals() {
    let mut rig = Rig::shipped_frame();
    rig.pull(6, 0, LeverState::Reversed);

    assert_eq!(rig.state("4"), LockState::Off);
    assert_eq!(rig.sim(6).slot(0).unwrap().commanded, LockState::Off);
    assert_eq!(rig.indicators(), [false, false, true, false, true, true]);
}

/// Test: clearing one home signal locks the other and frees its distant.
#[test]
fn conflicting_signals() {
    let mut rig = Rig::shipped_frame();
    rig.pull(6, 0, LeverState::Reversed);
    rig.pull(5, 0, LeverState::Reversed);

    assert_eq!(rig.state("1"), LockState::Off);
    assert_eq!(rig.indicators(), [false, true, true, false, false, true]);

    rig.pull(5, 0, LeverState::Normal);
    assert_eq!(rig.state("1"), LockState::On);
    assert_eq!(rig.indicators(), [false, false, true, false, true, true]);
}

/// Test: forcing a locked lever locks the whole frame until it is restored.
#[test]
fn forced_lever_locks_frame() {
    let mut rig = Rig::shipped_frame();
    rig.pull(5, 0, LeverState::Reversed);

    assert_eq!(rig.controller.interlocking().faulted_count(), 1);
    assert_eq!(rig.state("1"), LockState::On);
    assert_eq!(rig.sim(5).slot(0).unwrap().commanded, LockState::On);
    assert_eq!(rig.indicators(), [true; 6]);

    rig.pull(5, 0, LeverState::Normal);
    assert_eq!(rig.controller.interlocking().faulted_count(), 0);
    assert_eq!(rig.indicators(), AT_REST);
}

/// Test: a fault on one module blocks a legal move on the other.
#[test]
fn fault_blocks_other_module() {
    let mut rig = Rig::shipped_frame();
    rig.pull(5, 1, LeverState::Reversed);
    assert_eq!(rig.controller.interlocking().faulted_count(), 1);

    // Lever 4 would normally be free; it is now held by the fault.
    rig.pull(6, 0, LeverState::Reversed);
    assert_eq!(rig.state("4"), LockState::On);
    assert_eq!(rig.controller.interlocking().faulted_count(), 2);

    rig.pull(6, 0, LeverState::Normal);
    rig.pull(5, 1, LeverState::Normal);
    assert_eq!(rig.controller.interlocking().faulted_count(), 0);
    assert_eq!(rig.indicators(), AT_REST);
}
