//! Prelude module for common re-exports.
//!
//! ```rust
//! use ilock_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{BusConfig, ConfigError, ConfigLoader, ControllerConfig, SharedConfig};
pub use crate::layout::{InterlockingLayout, LeverEntry, LockRuleSpec, LockingEntry};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{FAULT_LOCK_ID, MAX_FRAME_PAYLOAD, MAX_MODULE_ADDR};

// ─── Domain Types ───────────────────────────────────────────────────
pub use crate::types::{
    DeviceId, DeviceSlot, LeverState, LockState, LockingId, LockingRule, ModuleType, SlotId,
    lever_matches_lock,
};
