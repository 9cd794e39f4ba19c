//! Interlocking arena: entity registry, lock propagation and fault lockout.

use std::collections::{BTreeMap, HashMap};

use ilock_common::consts::{FAULT_LOCK_ID, MAX_LOCKING_ID};
use ilock_common::types::{LeverState, LockState, LockingId, LockingRule, lever_matches_lock};
use tracing::{debug, info, trace, warn};

use crate::error::EngineError;
use crate::locking::{LeverStatus, Locking, LockingKind};

/// Name given to the reserved Fault Lock.
pub const FAULT_LOCK_NAME: &str = "FAULT";

/// Aggregate lock status change of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockChange {
    /// Entity whose locked flag flipped.
    pub id: LockingId,
    /// New locked flag.
    pub locked: bool,
}

/// Owns every locking entity of one frame.
///
/// Entity `id` lives at index `id`; index 0 is always the Fault Lock.
#[derive(Debug, Clone)]
pub struct Interlocking {
    entities: Vec<Locking>,
    names: HashMap<String, LockingId>,
    /// Fault flag per lever. Only levers appear here.
    faults: BTreeMap<LockingId, bool>,
    faulted_count: usize,
    /// Locked flag per entity before the first flip since the last drain,
    /// and the latest flag.
    changes: BTreeMap<LockingId, (bool, bool)>,
}

impl Default for Interlocking {
    fn default() -> Self {
        Self::new()
    }
}

impl Interlocking {
    /// Create an interlocking holding only the Fault Lock.
    ///
    /// The Fault Lock starts Off so that no lever is locked until a fault is
    /// actually raised.
    pub fn new() -> Self {
        let mut fault_lock =
            Locking::new(FAULT_LOCK_ID, FAULT_LOCK_NAME, LockingKind::FaultLock);
        fault_lock.set_state(LockState::Off);
        Self {
            entities: vec![fault_lock],
            names: HashMap::new(),
            faults: BTreeMap::new(),
            faulted_count: 0,
            changes: BTreeMap::new(),
        }
    }

    // ─── Registry ───────────────────────────────────────────────────

    fn allocate(&mut self, name: &str, kind: LockingKind) -> Result<LockingId, EngineError> {
        if self.names.contains_key(name) {
            return Err(EngineError::DuplicateName(name.to_string()));
        }
        if self.entities.len() > MAX_LOCKING_ID as usize {
            return Err(EngineError::CapacityExhausted);
        }
        let id = self.entities.len() as LockingId;
        self.entities.push(Locking::new(id, name, kind));
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Register an ancillary locking that has no sensed position.
    pub fn add_locking(&mut self, name: &str) -> Result<LockingId, EngineError> {
        let id = self.allocate(name, LockingKind::Ancillary)?;
        debug!(id, name, "locking registered");
        Ok(id)
    }

    /// Register a lever.
    ///
    /// The lever is tied to the Fault Lock: Fault Lock On imposes
    /// `LockedAny`, Fault Lock Off imposes nothing.
    pub fn add_lever(&mut self, name: &str) -> Result<LockingId, EngineError> {
        let id = self.allocate(name, LockingKind::Lever(LeverStatus::default()))?;
        self.faults.insert(id, false);
        let fault_lock = &mut self.entities[FAULT_LOCK_ID as usize];
        fault_lock.add_lock_rule(LockState::On, id, LockingRule::LockedAny);
        fault_lock.add_lock_rule(LockState::Off, id, LockingRule::Unlocked);
        debug!(id, name, "lever registered");
        Ok(id)
    }

    /// Entity by id.
    #[inline]
    pub fn locking(&self, id: LockingId) -> Option<&Locking> {
        self.entities.get(id as usize)
    }

    #[inline]
    fn locking_mut(&mut self, id: LockingId) -> Option<&mut Locking> {
        self.entities.get_mut(id as usize)
    }

    /// Entity by configured name. The Fault Lock is not reachable by name.
    pub fn locking_by_name(&self, name: &str) -> Option<&Locking> {
        self.id_of(name).and_then(|id| self.locking(id))
    }

    /// Id registered for a name.
    #[inline]
    pub fn id_of(&self, name: &str) -> Option<LockingId> {
        self.names.get(name).copied()
    }

    /// The system Fault Lock.
    #[inline]
    pub fn fault_lock(&self) -> &Locking {
        &self.entities[FAULT_LOCK_ID as usize]
    }

    /// Every registered entity except the Fault Lock, in id order.
    pub fn all_lockings(&self) -> impl Iterator<Item = &Locking> {
        self.entities.iter().skip(1)
    }

    /// Number of registered entities, excluding the Fault Lock.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len() - 1
    }

    /// Whether nothing besides the Fault Lock is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ─── Rule table ─────────────────────────────────────────────────

    /// Define the rule `id` imposes on `other` while `id` is in `state`.
    ///
    /// Returns `false` if `id` is unknown or already finalized.
    pub fn add_lock_rule(
        &mut self,
        id: LockingId,
        state: LockState,
        other: LockingId,
        rule: LockingRule,
    ) -> bool {
        match self.locking_mut(id) {
            Some(locking) => locking.add_lock_rule(state, other, rule),
            None => false,
        }
    }

    /// Record that `by` imposes `rule` on `id`. `Unlocked` withdraws.
    pub fn set_lock(&mut self, id: LockingId, by: LockingId, rule: LockingRule) {
        let flipped = match self.locking_mut(id) {
            Some(locking) => locking.set_lock(by, rule),
            None => return,
        };
        if flipped {
            self.record_change(id);
        }
    }

    /// Withdraw any lock `by` holds on `id`. No-op if it holds none.
    pub fn withdraw_lock(&mut self, id: LockingId, by: LockingId) {
        let flipped = match self.locking_mut(id) {
            Some(locking) => locking.withdraw_lock(by),
            None => return,
        };
        if flipped {
            self.record_change(id);
        }
    }

    /// Impose the current-state rules of `id` on all its peers.
    fn propagate(&mut self, id: LockingId) {
        let (state, imposed) = match self.locking(id) {
            Some(locking) => (locking.state(), locking.imposed_rules(locking.state())),
            None => return,
        };
        trace!(id, ?state, peers = imposed.len(), "propagating locks");
        for (other, rule) in imposed {
            if self.locking(other).is_none() {
                warn!(id, other, "lock rule targets unknown locking");
                continue;
            }
            if rule.is_locking() {
                self.set_lock(other, id, rule);
            } else {
                self.withdraw_lock(other, id);
            }
        }
    }

    /// Impose the initial locks of `id` and freeze its rule table.
    ///
    /// Peers locked by the initial state of `id` are locked before the
    /// first lever moves. A second call does nothing.
    pub fn finalize_lock_rules(&mut self, id: LockingId) {
        match self.locking(id) {
            Some(locking) if !locking.is_finalized() => {}
            _ => return,
        }
        self.propagate(id);
        if let Some(locking) = self.locking_mut(id) {
            locking.mark_finalized();
        }
    }

    /// Finalize every entity: levers and ancillaries in id order, Fault Lock last.
    pub fn finalize_all(&mut self) {
        for id in 1..self.entities.len() {
            self.finalize_lock_rules(id as LockingId);
        }
        self.finalize_lock_rules(FAULT_LOCK_ID);
        info!(lockings = self.len(), "interlocking finalized");
    }

    // ─── State changes ──────────────────────────────────────────────

    /// Set the logical state of `id`, then propagate its current state.
    ///
    /// A locked entity keeps its state unless `ignore_locked` is set, but
    /// its rules are re-imposed either way. Returns whether the state was
    /// written.
    pub fn apply_lock_state(
        &mut self,
        id: LockingId,
        state: LockState,
        ignore_locked: bool,
    ) -> bool {
        let applied = match self.locking_mut(id) {
            Some(locking) if ignore_locked || !locking.is_locked() => {
                locking.set_state(state);
                true
            }
            Some(locking) => {
                debug!(id, locked_by = ?locking.current_locked_by(), "state change refused");
                false
            }
            None => return false,
        };
        self.propagate(id);
        applied
    }

    /// Flip the logical state of `id` if it is unlocked.
    ///
    /// A locked entity is left untouched and nothing propagates.
    pub fn try_toggle_state(&mut self, id: LockingId) -> bool {
        let Some(locking) = self.locking(id) else {
            return false;
        };
        if locking.is_locked() {
            debug!(id, locked_by = ?locking.current_locked_by(), "toggle refused");
            return false;
        }
        let next = locking.state().toggled();
        self.apply_lock_state(id, next, false)
    }

    // ─── Lever sensing ──────────────────────────────────────────────

    /// Feed a sensed lever position.
    ///
    /// A changed position toggles the logical state when the lever is
    /// unlocked and the new position does not already match it. The fault
    /// flag then follows whether position and state agree. Unknown ids and
    /// non-levers are ignored.
    pub fn set_lever_state(&mut self, id: LockingId, position: LeverState) {
        let Some((status, state, locked)) = self
            .locking(id)
            .and_then(|l| l.lever().map(|s| (s, l.state(), l.is_locked())))
        else {
            return;
        };

        if position != status.sensed && !locked && !lever_matches_lock(position, state) {
            self.try_toggle_state(id);
        }
        self.update_sensed(id, position);
    }

    /// Flip the sensed position of a lever and try to toggle its state.
    ///
    /// The position always flips; a locked lever therefore ends up faulted.
    /// Returns whether the logical state toggled.
    pub fn throw_lever(&mut self, id: LockingId) -> bool {
        let Some(status) = self.locking(id).and_then(Locking::lever) else {
            return false;
        };
        let toggled = self.try_toggle_state(id);
        if !toggled {
            warn!(id, "lever thrown while locked");
        }
        self.update_sensed(id, status.sensed.toggled());
        toggled
    }

    fn update_sensed(&mut self, id: LockingId, sensed: LeverState) {
        let Some(locking) = self.locking_mut(id) else {
            return;
        };
        let faulted = !lever_matches_lock(sensed, locking.state());
        locking.set_lever_status(LeverStatus { sensed, faulted });
        self.set_lever_faulted(id, faulted);
    }

    /// Update the fault flag of a lever and drive the Fault Lock.
    ///
    /// The faulted count only moves when the flag actually changes. Any
    /// fault forces the Fault Lock On, none forces it Off, bypassing locks
    /// in both directions.
    pub fn set_lever_faulted(&mut self, id: LockingId, faulted: bool) {
        if let Some(locking) = self.locking_mut(id) {
            if let Some(mut status) = locking.lever() {
                status.faulted = faulted;
                locking.set_lever_status(status);
            }
        }
        let Some(flag) = self.faults.get_mut(&id) else {
            return;
        };
        if *flag != faulted {
            *flag = faulted;
            if faulted {
                self.faulted_count += 1;
                warn!(id, faulted = self.faulted_count, "lever faulted");
            } else {
                self.faulted_count -= 1;
                info!(id, faulted = self.faulted_count, "lever fault cleared");
            }
        }
        let fault_state = if self.faulted_count > 0 {
            LockState::On
        } else {
            LockState::Off
        };
        self.apply_lock_state(FAULT_LOCK_ID, fault_state, true);
    }

    /// Whether a lever is currently faulted.
    #[inline]
    pub fn is_faulted(&self, id: LockingId) -> bool {
        self.faults.get(&id).copied().unwrap_or(false)
    }

    /// Number of faulted levers.
    #[inline]
    pub fn faulted_count(&self) -> usize {
        self.faulted_count
    }

    // ─── Lock change queue ──────────────────────────────────────────

    fn record_change(&mut self, id: LockingId) {
        if let Some(locking) = self.locking(id) {
            let locked = locking.is_locked();
            self.changes.entry(id).or_insert((!locked, locked)).1 = locked;
        }
    }

    /// Take the net lock changes since the last drain, ordered by id.
    ///
    /// An entity that flipped and flipped back is left out.
    pub fn drain_lock_changes(&mut self) -> Vec<LockChange> {
        std::mem::take(&mut self.changes)
            .into_iter()
            .filter(|(_, (before, now))| before != now)
            .map(|(id, (_, locked))| LockChange { id, locked })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_levers() -> (Interlocking, LockingId, LockingId) {
        let mut il = Interlocking::new();
        let a = il.add_lever("A").unwrap();
        let b = il.add_lever("B").unwrap();
        (il, a, b)
    }

    #[test]
    fn fault_lock_is_reserved() {
        let il = Interlocking::new();
        assert_eq!(il.fault_lock().id(), FAULT_LOCK_ID);
        assert_eq!(il.fault_lock().state(), LockState::Off);
        assert_eq!(il.fault_lock().kind(), LockingKind::FaultLock);
        assert!(il.is_empty());
        assert!(il.locking_by_name(FAULT_LOCK_NAME).is_none());
    }

    #[test]
    fn ids_are_sequential_from_one() {
        let (mut il, a, b) = two_levers();
        assert_eq!((a, b), (1, 2));
        assert_eq!(il.add_locking("X").unwrap(), 3);
        assert_eq!(il.id_of("B"), Some(2));
        assert_eq!(il.locking_by_name("X").unwrap().kind(), LockingKind::Ancillary);
        assert_eq!(il.all_lockings().count(), 3);
    }

    #[test]
    fn duplicate_name_rejected() {
        let (mut il, _, _) = two_levers();
        assert_eq!(
            il.add_lever("A"),
            Err(EngineError::DuplicateName("A".to_string()))
        );
        assert_eq!(il.len(), 2);
    }

    #[test]
    fn capacity_is_bounded() {
        let mut il = Interlocking::new();
        for i in 0..MAX_LOCKING_ID {
            il.add_locking(&i.to_string()).unwrap();
        }
        assert_eq!(il.add_locking("overflow"), Err(EngineError::CapacityExhausted));
    }

    #[test]
    fn lever_carries_fault_rules() {
        let (il, a, _) = two_levers();
        let row = il.fault_lock().rule(a).unwrap();
        assert_eq!(row.locks_when_on, LockingRule::LockedAny);
        assert_eq!(row.locks_when_off, LockingRule::Unlocked);
    }

    #[test]
    fn ancillary_has_no_fault_rule() {
        let mut il = Interlocking::new();
        let x = il.add_locking("X").unwrap();
        assert!(il.fault_lock().rule(x).is_none());
        il.set_lever_faulted(x, true);
        assert_eq!(il.faulted_count(), 0);
    }

    #[test]
    fn finalize_freezes_rule_table() {
        let (mut il, a, b) = two_levers();
        il.add_lock_rule(a, LockState::Off, b, LockingRule::LockedAny);
        il.finalize_lock_rules(a);

        assert!(il.locking(a).unwrap().is_finalized());
        assert!(!il.add_lock_rule(a, LockState::On, b, LockingRule::LockedOn));
        assert_eq!(
            il.locking(a).unwrap().rule(b).unwrap().locks_when_on,
            LockingRule::Unlocked
        );
        // Peer rows are not created until a lock is actually imposed.
        assert!(!il.locking(b).unwrap().is_locked());
    }

    #[test]
    fn finalize_propagates_current_state() {
        let (mut il, a, b) = two_levers();
        il.add_lock_rule(a, LockState::On, b, LockingRule::LockedAny);
        il.finalize_lock_rules(a);
        assert!(il.locking(b).unwrap().is_locked());
        assert_eq!(
            il.drain_lock_changes(),
            vec![LockChange { id: b, locked: true }]
        );
    }

    #[test]
    fn toggle_refused_while_locked() {
        let (mut il, a, b) = two_levers();
        il.add_lock_rule(a, LockState::On, b, LockingRule::LockedAny);
        il.finalize_all();

        assert!(!il.try_toggle_state(b));
        assert_eq!(il.locking(b).unwrap().state(), LockState::On);

        assert!(!il.apply_lock_state(b, LockState::Off, false));
        assert_eq!(il.locking(b).unwrap().state(), LockState::On);

        assert!(il.apply_lock_state(b, LockState::Off, true));
        assert_eq!(il.locking(b).unwrap().state(), LockState::Off);
    }

    #[test]
    fn refused_apply_still_propagates() {
        let mut il = Interlocking::new();
        let a = il.add_locking("A").unwrap();
        let b = il.add_locking("B").unwrap();
        let c = il.add_locking("C").unwrap();
        il.add_lock_rule(a, LockState::On, b, LockingRule::LockedAny);
        il.set_lock(a, c, LockingRule::LockedAny);

        assert!(!il.apply_lock_state(a, LockState::Off, false));
        assert_eq!(il.locking(a).unwrap().state(), LockState::On);
        assert!(il.locking(b).unwrap().is_locked());
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut il = Interlocking::new();
        assert!(!il.add_lock_rule(9, LockState::On, 1, LockingRule::LockedAny));
        assert!(!il.apply_lock_state(9, LockState::Off, true));
        assert!(!il.try_toggle_state(9));
        assert!(!il.throw_lever(9));
        il.set_lever_state(9, LeverState::Reversed);
        il.set_lock(9, 1, LockingRule::LockedAny);
        il.withdraw_lock(9, 1);
        il.finalize_lock_rules(9);
        assert!(il.drain_lock_changes().is_empty());
    }

    #[test]
    fn drain_empties_queue() {
        let (mut il, a, b) = two_levers();
        il.set_lock(b, a, LockingRule::LockedAny);
        il.set_lock(b, a, LockingRule::LockedOn);
        assert_eq!(
            il.drain_lock_changes(),
            vec![LockChange { id: b, locked: true }]
        );
        assert!(il.drain_lock_changes().is_empty());
    }

    #[test]
    fn lock_then_withdraw_nets_out() {
        let (mut il, a, b) = two_levers();
        il.set_lock(b, a, LockingRule::LockedAny);
        il.withdraw_lock(b, a);
        il.set_lock(a, b, LockingRule::LockedAny);
        assert_eq!(
            il.drain_lock_changes(),
            vec![LockChange { id: a, locked: true }]
        );
    }

    #[test]
    fn lock_change_queue_is_bounded_by_entities() {
        let (mut il, a, b) = two_levers();
        for _ in 0..1000 {
            il.set_lock(b, a, LockingRule::LockedAny);
            il.withdraw_lock(b, a);
        }
        assert!(il.changes.len() <= 1);
        il.set_lock(b, a, LockingRule::LockedAny);
        assert_eq!(
            il.drain_lock_changes(),
            vec![LockChange { id: b, locked: true }]
        );
        assert!(il.changes.is_empty());
    }

    #[test]
    fn direct_fault_updates_lever_status() {
        let (mut il, a, _) = two_levers();
        il.finalize_all();

        il.set_lever_faulted(a, true);
        assert!(il.is_faulted(a));
        assert_eq!(il.locking(a).unwrap().lever().unwrap().faulted, il.is_faulted(a));

        il.set_lever_faulted(a, false);
        assert!(!il.is_faulted(a));
        assert_eq!(il.locking(a).unwrap().lever().unwrap().faulted, il.is_faulted(a));
    }

    #[test]
    fn throw_unlocked_lever_stays_unfaulted() {
        let (mut il, a, _) = two_levers();
        il.finalize_all();

        assert!(il.throw_lever(a));
        let lever = il.locking(a).unwrap();
        assert_eq!(lever.state(), LockState::Off);
        assert_eq!(lever.lever().unwrap().sensed, LeverState::Reversed);
        assert!(!il.is_faulted(a));
        assert_eq!(il.fault_lock().state(), LockState::Off);
    }

    #[test]
    fn set_lever_state_same_position_is_noop() {
        let (mut il, a, _) = two_levers();
        il.finalize_all();
        il.set_lever_state(a, LeverState::Normal);
        assert_eq!(il.locking(a).unwrap().state(), LockState::On);
        assert!(!il.is_faulted(a));
    }
}
