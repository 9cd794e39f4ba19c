//! Lever sensing and the system-wide Fault Lock.

use ilock_common::consts::FAULT_LOCK_ID;
use ilock_common::types::{LeverState, LockState, LockingId, LockingRule};
use ilock_engine::Interlocking;

fn three_levers() -> (Interlocking, [LockingId; 3]) {
    let mut il = Interlocking::new();
    let ids = [
        il.add_lever("1").unwrap(),
        il.add_lever("2").unwrap(),
        il.add_lever("3").unwrap(),
    ];
    (il, ids)
}

/// Test: sensing the opposite position on a locked lever faults it and
/// leaves its logical state alone.
#[test]
fn locked_lever_sensed_moving_is_faulted() {
    let (mut il, [a, b, _]) = three_levers();
    il.add_lock_rule(a, LockState::On, b, LockingRule::LockedAny);
    il.finalize_all();
    assert!(il.locking(b).unwrap().is_locked());

    il.set_lever_state(b, LeverState::Reversed);

    assert!(il.is_faulted(b));
    assert_eq!(il.locking(b).unwrap().state(), LockState::On);
    assert_eq!(il.fault_lock().state(), LockState::On);
}

/// Test: one fault locks all three levers; clearing it restores each
/// lever's previous lock status.
#[test]
fn single_fault_locks_every_lever() {
    let (mut il, ids) = three_levers();
    let [a, b, c] = ids;
    il.add_lock_rule(a, LockState::On, c, LockingRule::LockedOn);
    il.finalize_all();

    let before: Vec<bool> = ids
        .iter()
        .map(|id| il.locking(*id).unwrap().is_locked())
        .collect();
    assert_eq!(before, vec![false, false, true]);

    il.set_lever_faulted(b, true);
    assert_eq!(il.faulted_count(), 1);
    for id in ids {
        let locking = il.locking(id).unwrap();
        assert!(locking.is_locked());
        assert!(locking.current_locked_by().contains(&FAULT_LOCK_ID));
    }

    il.set_lever_faulted(b, false);
    assert_eq!(il.faulted_count(), 0);
    let after: Vec<bool> = ids
        .iter()
        .map(|id| il.locking(*id).unwrap().is_locked())
        .collect();
    assert_eq!(after, before);
    assert_eq!(il.locking(c).unwrap().current_locked_by(), &[a]);
}

/// Test: repeated fault reports do not double count.
#[test]
fn fault_count_is_transactional() {
    let (mut il, [a, b, _]) = three_levers();
    il.finalize_all();

    il.set_lever_faulted(a, true);
    il.set_lever_faulted(a, true);
    il.set_lever_faulted(b, true);
    assert_eq!(il.faulted_count(), 2);

    il.set_lever_faulted(a, false);
    assert_eq!(il.fault_lock().state(), LockState::On);
    il.set_lever_faulted(a, false);
    assert_eq!(il.faulted_count(), 1);

    il.set_lever_faulted(b, false);
    assert_eq!(il.faulted_count(), 0);
    assert_eq!(il.fault_lock().state(), LockState::Off);
}

/// Test: throwing a locked lever flips the sensed position anyway.
#[test]
fn throwing_locked_lever_faults() {
    let (mut il, [a, b, _]) = three_levers();
    il.add_lock_rule(a, LockState::On, b, LockingRule::LockedAny);
    il.finalize_all();

    assert!(!il.throw_lever(b));
    let lever = il.locking(b).unwrap();
    assert_eq!(lever.state(), LockState::On);
    assert_eq!(lever.lever().unwrap().sensed, LeverState::Reversed);
    assert!(lever.lever().unwrap().faulted);
    assert!(il.is_faulted(b));
}

/// Test: returning a faulted lever to its logical position clears the
/// fault even though other levers were locked meanwhile.
#[test]
fn restoring_position_clears_fault() {
    let (mut il, [a, b, c]) = three_levers();
    il.add_lock_rule(a, LockState::On, b, LockingRule::LockedAny);
    il.finalize_all();

    il.set_lever_state(b, LeverState::Reversed);
    assert!(il.locking(c).unwrap().is_locked());

    il.set_lever_state(b, LeverState::Normal);
    assert!(!il.is_faulted(b));
    assert_eq!(il.locking(b).unwrap().state(), LockState::On);
    assert!(!il.locking(c).unwrap().is_locked());
    assert!(il.locking(b).unwrap().is_locked());
}

/// Test: an unlocked lever follows its sensed position.
#[test]
fn unlocked_lever_follows_sensing() {
    let (mut il, [a, _, _]) = three_levers();
    il.finalize_all();

    il.set_lever_state(a, LeverState::Reversed);
    assert_eq!(il.locking(a).unwrap().state(), LockState::Off);
    assert!(!il.is_faulted(a));

    il.set_lever_state(a, LeverState::Normal);
    assert_eq!(il.locking(a).unwrap().state(), LockState::On);
}
