//! Simulated lever module.
//!
//! Stands in for one remote lever device on the bus: registers when the
//! controller sends `Init`, follows `SetLockState` / `SetLockIndication`, and
//! reports lever movements with `SetLeverState`.

use ilock_bus::{
    BusError, BusLink, BusSettings, Dispatch, MessageDispatcher, SetLeverState,
    SetLockIndication, SetLockState, Transport,
};
use ilock_common::consts::CONTROLLER_DEVICE_ID;
use ilock_common::types::{
    DeviceId, LeverState, LockState, ModuleType, SlotId, lever_matches_lock,
};
use tracing::{debug, trace};

/// One lever slot on a simulated module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimSlot {
    /// Position reported by the (simulated) sensor.
    pub sensed: LeverState,
    /// Logical state last commanded by the controller.
    pub commanded: LockState,
    /// Whether the lock indicator is lit.
    pub locked: bool,
}

#[derive(Debug)]
struct SimState {
    slots: Vec<SimSlot>,
    indication: bool,
}

/// Simulated lever module with its own dispatcher.
pub struct LeverModuleSim {
    address: DeviceId,
    state: SimState,
    dispatcher: MessageDispatcher<SimState>,
    /// Slot index to try first on the next scripted throw.
    next_throw: usize,
}

impl LeverModuleSim {
    /// Module at bus `address` with `slots` levers, all `Normal`.
    pub fn new(address: DeviceId, slots: usize) -> Self {
        let mut dispatcher = MessageDispatcher::new();
        dispatcher.register_device(ModuleType::Lever, address);
        dispatcher.on_message::<SetLockState, _>(
            move |state: &mut SimState, msg: SetLockState, _: &mut BusLink| {
                let Some(slot) = state.slots.get_mut(usize::from(msg.slot)) else {
                    debug!(address, slot = msg.slot, "lock state for missing slot");
                    return;
                };
                slot.commanded = msg.state;
                slot.locked = msg.locked;
                trace!(address, slot = msg.slot, state = ?msg.state, locked = msg.locked, "lock state applied");
            },
        );
        dispatcher.on_message::<SetLockIndication, _>(
            |state: &mut SimState, msg: SetLockIndication, _: &mut BusLink| {
                state.indication = msg.show;
            },
        );

        Self {
            address,
            state: SimState {
                slots: vec![SimSlot::default(); slots],
                indication: true,
            },
            dispatcher,
            next_throw: 0,
        }
    }

    /// Start the module on `transport`.
    pub fn start(&mut self, transport: Box<dyn Transport>) -> Result<(), BusError> {
        self.dispatcher.start(transport, &BusSettings::default())
    }

    /// Handle one pending frame.
    pub fn poll(&mut self) -> Dispatch {
        self.dispatcher.process_received(&mut self.state)
    }

    /// Handle every pending frame; returns how many were read.
    pub fn poll_all(&mut self) -> usize {
        let mut count = 0;
        while self.poll() != Dispatch::Idle {
            count += 1;
        }
        count
    }

    /// Move the lever in `slot` and report it to the controller.
    ///
    /// The report's `faulted` flag is set when the new position disagrees
    /// with the last commanded logical state.
    pub fn move_lever(&mut self, slot: SlotId, state: LeverState) -> Result<(), BusError> {
        let Some(entry) = self.state.slots.get_mut(usize::from(slot)) else {
            debug!(address = self.address, slot, "move on missing slot");
            return Ok(());
        };
        entry.sensed = state;
        let report = SetLeverState {
            device_id: self.address,
            slot,
            state,
            faulted: !lever_matches_lock(state, entry.commanded),
        };
        self.dispatcher.send_message(CONTROLLER_DEVICE_ID, report)
    }

    /// Throw the next unlocked lever, round-robin over the slots.
    ///
    /// Returns the slot moved, or `None` when every lever is locked.
    pub fn throw_next_unlocked(&mut self) -> Result<Option<SlotId>, BusError> {
        let count = self.state.slots.len();
        for step in 0..count {
            let index = (self.next_throw + step) % count;
            let entry = self.state.slots[index];
            if entry.locked {
                continue;
            }
            let Ok(slot) = SlotId::try_from(index) else {
                break;
            };
            self.next_throw = index + 1;
            self.move_lever(slot, entry.sensed.toggled())?;
            debug!(address = self.address, slot, "simulated lever thrown");
            return Ok(Some(slot));
        }
        Ok(None)
    }

    pub fn address(&self) -> DeviceId {
        self.address
    }

    pub fn slot(&self, slot: SlotId) -> Option<&SimSlot> {
        self.state.slots.get(usize::from(slot))
    }

    /// Whether lock indicators are enabled.
    pub fn indication(&self) -> bool {
        self.state.indication
    }
}
