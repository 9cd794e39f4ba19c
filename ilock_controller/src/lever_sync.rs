//! Device synchronization: keeps per-slot lever records in step with the
//! remote lever modules and re-asserts lock state over the bus.

use std::collections::{BTreeMap, BTreeSet};

use ilock_bus::BusLink;
use ilock_bus::message::{Register, SetLeverState, SetLockIndication, SetLockState};
use ilock_common::consts::CONTROLLER_DEVICE_ID;
use ilock_common::types::{DeviceId, DeviceSlot, LeverState, LockState, LockingId};
use ilock_engine::Interlocking;
use tracing::{debug, trace, warn};

/// Controller-side record of one remote lever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeverInfo {
    pub locking_id: LockingId,
    /// Last logical state reported to the module.
    pub lock_state: LockState,
    /// Last sensed position accepted from the module.
    pub current_state: LeverState,
    pub lever_locked: bool,
}

/// Decides whether a sensed lever change is accepted.
pub trait LeverPolicy {
    /// Called when a module reports a new position for `id`.
    fn allow_change(&mut self, id: LockingId, proposed: LeverState) -> bool;

    /// Authoritative `(state, locked)` of `id` to echo back, if known.
    fn lock_status(&self, _id: LockingId) -> Option<(LockState, bool)> {
        None
    }
}

/// Accept every change.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl LeverPolicy for AllowAll {
    fn allow_change(&mut self, _id: LockingId, _proposed: LeverState) -> bool {
        true
    }
}

/// Closure-backed policy.
pub struct PolicyFn<F>(pub F);

impl<F> LeverPolicy for PolicyFn<F>
where
    F: FnMut(LockingId, LeverState) -> bool,
{
    fn allow_change(&mut self, id: LockingId, proposed: LeverState) -> bool {
        (self.0)(id, proposed)
    }
}

/// Feed the sensed position into the engine and always accept it; the
/// engine decides the logical state and lock flag that get echoed back.
impl LeverPolicy for Interlocking {
    fn allow_change(&mut self, id: LockingId, proposed: LeverState) -> bool {
        self.set_lever_state(id, proposed);
        true
    }

    fn lock_status(&self, id: LockingId) -> Option<(LockState, bool)> {
        self.locking(id).map(|l| (l.state(), l.is_locked()))
    }
}

/// Per-slot lever records and the roster of registered modules.
#[derive(Debug, Clone)]
pub struct LeverSyncManager {
    levers: BTreeMap<DeviceSlot, LeverInfo>,
    slots: BTreeMap<LockingId, DeviceSlot>,
    indicate_locks: bool,
    registered: Vec<DeviceId>,
}

impl Default for LeverSyncManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LeverSyncManager {
    pub fn new() -> Self {
        Self {
            levers: BTreeMap::new(),
            slots: BTreeMap::new(),
            indicate_locks: true,
            registered: Vec::new(),
        }
    }

    /// Bind a remote slot to a local locking id.
    ///
    /// Rebinding drops the previous slot of `id` and the previous id of
    /// `slot`, so both maps stay one-to-one.
    pub fn register_lever(&mut self, slot: DeviceSlot, id: LockingId, locked: bool) {
        if let Some(old_slot) = self.slots.remove(&id) {
            if old_slot != slot {
                self.levers.remove(&old_slot);
                debug!(%old_slot, id, "lever unbound");
            }
        }
        if let Some(old) = self.levers.get(&slot) {
            if old.locking_id != id {
                self.slots.remove(&old.locking_id);
            }
        }
        self.levers.insert(
            slot,
            LeverInfo {
                locking_id: id,
                lock_state: LockState::default(),
                current_state: LeverState::default(),
                lever_locked: locked,
            },
        );
        self.slots.insert(id, slot);
        debug!(%slot, id, locked, "lever bound");
    }

    /// Handle a position report from a lever module.
    ///
    /// Unknown slots and unchanged positions are ignored. An accepted change
    /// is answered with `SetLockState` to the reporting module. Returns
    /// whether a reply was sent.
    pub fn handle_set_lever_state(
        &mut self,
        msg: &SetLeverState,
        policy: &mut dyn LeverPolicy,
        link: &mut BusLink,
    ) -> bool {
        let slot = DeviceSlot::new(msg.device_id, msg.slot);
        let Some(info) = self.levers.get_mut(&slot) else {
            debug!(%slot, "position report for unbound slot");
            return false;
        };
        if msg.state == info.current_state {
            trace!(%slot, state = ?msg.state, "position unchanged");
            return false;
        }
        if !policy.allow_change(info.locking_id, msg.state) {
            debug!(%slot, id = info.locking_id, state = ?msg.state, "position change refused");
            return false;
        }

        info.current_state = msg.state;
        if let Some((state, locked)) = policy.lock_status(info.locking_id) {
            info.lock_state = state;
            info.lever_locked = locked;
        }
        if msg.faulted {
            debug!(%slot, "module reports lever out of position");
        }
        self.send_lock_state(slot, link);
        true
    }

    /// Update the locked flag of `id`; tell its module only on a change.
    pub fn set_lever_lock_state(&mut self, id: LockingId, locked: bool, link: &mut BusLink) {
        let Some(slot) = self.slots.get(&id).copied() else {
            return;
        };
        let Some(info) = self.levers.get_mut(&slot) else {
            return;
        };
        let changed = info.lever_locked != locked;
        info.lever_locked = locked;
        if changed {
            self.send_lock_state(slot, link);
        }
    }

    /// Switch lock indicators on every module; broadcast only on a change.
    pub fn set_lever_lock_indication(&mut self, on: bool, link: &mut BusLink) {
        if on != self.indicate_locks {
            if let Err(err) = link.send_message(CONTROLLER_DEVICE_ID, SetLockIndication { show: on }) {
                warn!(%err, "failed to broadcast lock indication");
            }
        }
        self.indicate_locks = on;
    }

    /// Record a module announcing itself.
    pub fn on_register(&mut self, msg: &Register) {
        debug!(device = msg.device_id, module = ?msg.module_type, "module registered");
        self.registered.push(msg.device_id);
    }

    /// Overwrite the logical state and lock flag of `id` without sending.
    pub fn refresh(&mut self, id: LockingId, state: LockState, locked: bool) {
        if let Some(info) = self.slots.get(&id).and_then(|slot| self.levers.get_mut(slot)) {
            info.lock_state = state;
            info.lever_locked = locked;
        }
    }

    /// Send the stored lock state of `slot` to its module.
    pub fn send_lock_state(&self, slot: DeviceSlot, link: &mut BusLink) {
        let Some(info) = self.levers.get(&slot) else {
            return;
        };
        let msg = SetLockState {
            slot: slot.slot,
            state: info.lock_state,
            locked: info.lever_locked,
        };
        if let Err(err) = link.send_message(slot.address, msg) {
            warn!(%slot, %err, "failed to send lock state");
        }
    }

    /// Last accepted position of `slot`; `Normal` for unbound slots.
    pub fn state(&self, slot: DeviceSlot) -> LeverState {
        self.levers
            .get(&slot)
            .map_or(LeverState::Normal, |info| info.current_state)
    }

    pub fn lever(&self, slot: DeviceSlot) -> Option<&LeverInfo> {
        self.levers.get(&slot)
    }

    pub fn slot_of(&self, id: LockingId) -> Option<DeviceSlot> {
        self.slots.get(&id).copied()
    }

    /// Bound slots in flattened order.
    pub fn levers(&self) -> impl Iterator<Item = (DeviceSlot, &LeverInfo)> {
        self.levers.iter().map(|(slot, info)| (*slot, info))
    }

    /// Device ids in the order their `Register` messages arrived.
    pub fn addresses(&self) -> &[DeviceId] {
        &self.registered
    }

    /// Distinct module addresses with at least one bound lever.
    pub fn bound_addresses(&self) -> BTreeSet<DeviceId> {
        self.levers.keys().map(|slot| slot.address).collect()
    }

    pub fn indicate_locks(&self) -> bool {
        self.indicate_locks
    }
}
