//! # Interlocking Rule Engine
//!
//! Tracks which lockings (levers and ancillary mechanisms) prevent which
//! others from changing state. Every entity carries a rule table keyed by
//! peer id; a state change re-imposes or withdraws rules on each peer.
//!
//! Levers additionally carry a sensed position. When the sensed position
//! disagrees with the logical state the lever is faulted, and while any
//! lever is faulted the system Fault Lock (id 0) locks every lever.
//!
//! All entities live in one [`Interlocking`] arena and refer to each other
//! by [`LockingId`](ilock_common::types::LockingId).

pub mod error;
pub mod interlocking;
pub mod layout;
pub mod locking;

pub use error::EngineError;
pub use interlocking::{Interlocking, LockChange};
pub use layout::LeverBinding;
pub use locking::{LeverStatus, LockRuleRow, Locking, LockingKind};
