//! Rule propagation across several lockings.

use ilock_common::layout::InterlockingLayout;
use ilock_common::types::{LockState, LockingRule};
use ilock_engine::{Interlocking, LockChange};

/// Test: A locks B while On; A going Off releases it.
#[test]
fn locked_on_rule_follows_acting_state() {
    let mut il = Interlocking::new();
    let a = il.add_locking("A").unwrap();
    let b = il.add_locking("B").unwrap();

    il.add_lock_rule(a, LockState::On, b, LockingRule::LockedOn);
    il.apply_lock_state(a, LockState::On, false);

    let locked_b = il.locking(b).unwrap();
    assert!(locked_b.is_locked());
    assert!(locked_b.current_locked_by().contains(&a));

    il.apply_lock_state(a, LockState::Off, false);
    assert!(!il.locking(b).unwrap().is_locked());
}

/// Test: finalizing twice has the same effect as once.
#[test]
fn finalize_is_idempotent() {
    let build = || {
        let mut il = Interlocking::new();
        let a = il.add_lever("A").unwrap();
        let b = il.add_lever("B").unwrap();
        let c = il.add_lever("C").unwrap();
        il.add_lock_rule(a, LockState::On, b, LockingRule::LockedAny);
        il.add_lock_rule(a, LockState::Off, c, LockingRule::LockedAny);
        (il, a, b, c)
    };

    let (mut once, a, b, c) = build();
    once.finalize_lock_rules(a);

    let (mut twice, _, _, _) = build();
    twice.finalize_lock_rules(a);
    let first_changes = twice.drain_lock_changes();
    twice.finalize_lock_rules(a);

    assert_eq!(first_changes, once.drain_lock_changes());
    assert!(twice.drain_lock_changes().is_empty());
    for id in [a, b, c] {
        assert_eq!(
            once.locking(id).unwrap().is_locked(),
            twice.locking(id).unwrap().is_locked()
        );
        assert_eq!(
            once.locking(id).unwrap().current_locked_by(),
            twice.locking(id).unwrap().current_locked_by()
        );
    }
}

/// Test: withdrawing a lock that was never set changes nothing.
#[test]
fn withdraw_without_lock_keeps_status() {
    let mut il = Interlocking::new();
    let a = il.add_locking("A").unwrap();
    let b = il.add_locking("B").unwrap();
    let c = il.add_locking("C").unwrap();

    il.withdraw_lock(b, a);
    assert!(!il.locking(b).unwrap().is_locked());

    il.set_lock(b, c, LockingRule::LockedAny);
    il.withdraw_lock(b, a);
    assert!(il.locking(b).unwrap().is_locked());
    assert_eq!(il.locking(b).unwrap().current_locked_by(), &[c]);
}

/// Test: a simple route frame where lever 1 guards levers 2 and 3.
///
/// Levers 2 and 3 can only move once lever 1 is reversed, and lever 1 is
/// held while either of them is reversed.
#[test]
fn route_frame_sequence() {
    let layout: InterlockingLayout = toml::from_str(
        r#"
[[levers]]
name = "1"
device = 5
slot = 0

[[levers]]
name = "2"
device = 5
slot = 1

[[levers]]
name = "3"
device = 6
slot = 0

[[locking]]
acting = "1"
affecting = ["2", "3"]
state_on = "LockedAny"
state_off = "Unlocked"

[[locking]]
acting = "2"
affecting = ["1"]
state_on = "Unlocked"
state_off = "LockedAny"

[[locking]]
acting = "3"
affecting = ["1"]
state_on = "Unlocked"
state_off = "LockedAny"
"#,
    )
    .unwrap();
    let (mut il, bindings) = Interlocking::from_layout(&layout).unwrap();
    let [one, two, three] = [bindings[0].id, bindings[1].id, bindings[2].id];

    assert!(il.locking(two).unwrap().is_locked());
    assert!(il.locking(three).unwrap().is_locked());
    assert!(!il.throw_lever(two));
    assert!(il.is_faulted(two));

    // Put lever 2 back, clearing the fault.
    il.set_lever_state(two, ilock_common::types::LeverState::Normal);
    assert!(!il.is_faulted(two));
    il.drain_lock_changes();

    assert!(il.throw_lever(one));
    assert_eq!(
        il.drain_lock_changes(),
        vec![
            LockChange { id: two, locked: false },
            LockChange { id: three, locked: false }
        ]
    );

    assert!(il.throw_lever(two));
    assert!(il.locking(one).unwrap().is_locked());
    assert!(!il.throw_lever(one));
    assert!(il.is_faulted(one));
    assert_eq!(il.faulted_count(), 1);
}
