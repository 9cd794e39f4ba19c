//! Build an [`Interlocking`] from a parsed frame layout.

use ilock_common::layout::InterlockingLayout;
use ilock_common::types::{DeviceSlot, LockState, LockingId};
use tracing::info;

use crate::error::EngineError;
use crate::interlocking::Interlocking;

/// A lever and the device slot it is wired to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeverBinding {
    pub id: LockingId,
    pub name: String,
    pub slot: DeviceSlot,
}

impl Interlocking {
    /// Register every lever, add every rule tuple, then finalize.
    ///
    /// Rule tuples are added with `rule_on` for `On` and `rule_off` for
    /// `Off` on the acting lever.
    ///
    /// # Errors
    ///
    /// - `EngineError::LeverNotFound` if a rule names an undeclared lever
    /// - `EngineError::DuplicateName` / `CapacityExhausted` from registration
    pub fn from_layout(
        layout: &InterlockingLayout,
    ) -> Result<(Self, Vec<LeverBinding>), EngineError> {
        let mut interlocking = Self::new();
        let mut bindings = Vec::with_capacity(layout.levers.len());

        for lever in &layout.levers {
            let id = interlocking.add_lever(&lever.name)?;
            bindings.push(LeverBinding {
                id,
                name: lever.name.clone(),
                slot: lever.device_slot(),
            });
        }

        let mut rule_count = 0usize;
        for rule in layout.rules() {
            let acting = interlocking
                .id_of(rule.acting)
                .ok_or_else(|| EngineError::LeverNotFound(rule.acting.to_string()))?;
            let affected = interlocking
                .id_of(rule.affected)
                .ok_or_else(|| EngineError::LeverNotFound(rule.affected.to_string()))?;
            interlocking.add_lock_rule(acting, LockState::On, affected, rule.rule_on);
            interlocking.add_lock_rule(acting, LockState::Off, affected, rule.rule_off);
            rule_count += 1;
        }

        interlocking.finalize_all();
        info!(
            levers = bindings.len(),
            rules = rule_count,
            "interlocking built from layout"
        );
        Ok((interlocking, bindings))
    }
}
