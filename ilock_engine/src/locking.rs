//! Single locking entity and its rule table.
//!
//! A `Locking` only knows about its own rows. Anything that touches a peer
//! (propagation, finalize, fault handling) goes through
//! [`Interlocking`](crate::interlocking::Interlocking), which owns every
//! entity and resolves peers by id.

use std::collections::BTreeMap;

use ilock_common::types::{LeverState, LockState, LockingId, LockingRule};

/// One row of a rule table, keyed by the peer's id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockRuleRow {
    /// Rule the peer currently imposes on this entity.
    pub locked_by: LockingRule,
    /// Rule this entity imposes on the peer while this entity is On.
    pub locks_when_on: LockingRule,
    /// Rule this entity imposes on the peer while this entity is Off.
    pub locks_when_off: LockingRule,
}

impl LockRuleRow {
    /// Rule imposed on the peer when this entity is in `state`.
    #[inline]
    pub const fn rule_for(&self, state: LockState) -> LockingRule {
        match state {
            LockState::On => self.locks_when_on,
            LockState::Off => self.locks_when_off,
        }
    }
}

/// Sensed side of a lever.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeverStatus {
    /// Last sensed mechanical position.
    pub sensed: LeverState,
    /// Sensed position disagrees with the logical state.
    pub faulted: bool,
}

/// What a locking entity represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockingKind {
    /// The reserved system Fault Lock (id 0).
    FaultLock,
    /// Ancillary mechanism without a sensed position.
    Ancillary,
    /// Lever with a sensed position.
    Lever(LeverStatus),
}

/// A locking entity.
#[derive(Debug, Clone)]
pub struct Locking {
    id: LockingId,
    name: String,
    state: LockState,
    kind: LockingKind,
    rules: BTreeMap<LockingId, LockRuleRow>,
    locked: bool,
    locked_by: Vec<LockingId>,
    finalized: bool,
}

impl Locking {
    pub(crate) fn new(id: LockingId, name: impl Into<String>, kind: LockingKind) -> Self {
        Self {
            id,
            name: name.into(),
            state: LockState::default(),
            kind,
            rules: BTreeMap::new(),
            locked: false,
            locked_by: Vec::new(),
            finalized: false,
        }
    }

    /// Locking id.
    #[inline]
    pub fn id(&self) -> LockingId {
        self.id
    }

    /// Configured name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logical state.
    #[inline]
    pub fn state(&self) -> LockState {
        self.state
    }

    /// Entity kind.
    #[inline]
    pub fn kind(&self) -> LockingKind {
        self.kind
    }

    /// Lever status, if this entity is a lever.
    #[inline]
    pub fn lever(&self) -> Option<LeverStatus> {
        match self.kind {
            LockingKind::Lever(status) => Some(status),
            _ => None,
        }
    }

    /// Whether this entity is a lever.
    #[inline]
    pub fn is_lever(&self) -> bool {
        matches!(self.kind, LockingKind::Lever(_))
    }

    /// Whether any peer currently locks this entity.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Ids of the peers currently locking this entity, in id order.
    #[inline]
    pub fn current_locked_by(&self) -> &[LockingId] {
        &self.locked_by
    }

    /// Whether the rule table has been finalized.
    #[inline]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Row for a peer, if one exists.
    #[inline]
    pub fn rule(&self, other: LockingId) -> Option<&LockRuleRow> {
        self.rules.get(&other)
    }

    /// All rows in peer id order.
    pub fn rules(&self) -> impl Iterator<Item = (LockingId, &LockRuleRow)> {
        self.rules.iter().map(|(id, row)| (*id, row))
    }

    /// Define the rule imposed on `other` when this entity enters `state`.
    ///
    /// Returns `false` without touching the table once finalized.
    pub(crate) fn add_lock_rule(
        &mut self,
        state: LockState,
        other: LockingId,
        rule: LockingRule,
    ) -> bool {
        if self.finalized {
            return false;
        }
        let row = self.rules.entry(other).or_default();
        match state {
            LockState::On => row.locks_when_on = rule,
            LockState::Off => row.locks_when_off = rule,
        }
        true
    }

    /// Record that `by` imposes `rule` on this entity.
    ///
    /// An `Unlocked` rule withdraws instead. Returns `true` if the aggregate
    /// locked flag flipped.
    pub(crate) fn set_lock(&mut self, by: LockingId, rule: LockingRule) -> bool {
        if !rule.is_locking() {
            return self.withdraw_lock(by);
        }
        self.rules.entry(by).or_default().locked_by = rule;
        self.update_lock_status()
    }

    /// Withdraw whatever `by` imposes on this entity.
    ///
    /// No-op when `by` holds no lock. Returns `true` if the aggregate locked
    /// flag flipped.
    pub(crate) fn withdraw_lock(&mut self, by: LockingId) -> bool {
        match self.rules.get_mut(&by) {
            Some(row) if row.locked_by.is_locking() => {
                row.locked_by = LockingRule::Unlocked;
                self.update_lock_status()
            }
            _ => false,
        }
    }

    /// Recompute `locked` / `locked_by` from all rows.
    fn update_lock_status(&mut self) -> bool {
        let was_locked = self.locked;
        self.locked_by.clear();
        self.locked_by.extend(
            self.rules
                .iter()
                .filter(|(_, row)| row.locked_by.is_locking())
                .map(|(id, _)| *id),
        );
        self.locked = !self.locked_by.is_empty();
        was_locked != self.locked
    }

    /// Rules to impose on each peer for a given own state.
    pub(crate) fn imposed_rules(&self, state: LockState) -> Vec<(LockingId, LockingRule)> {
        self.rules
            .iter()
            .map(|(id, row)| (*id, row.rule_for(state)))
            .collect()
    }

    pub(crate) fn set_state(&mut self, state: LockState) {
        self.state = state;
    }

    pub(crate) fn set_lever_status(&mut self, status: LeverStatus) {
        if let LockingKind::Lever(current) = &mut self.kind {
            *current = status;
        }
    }

    pub(crate) fn mark_finalized(&mut self) {
        self.finalized = true;
    }
}
