//! # Interlocking Controller
//!
//! Central node of the lever frame: binds remote lever slots to the rule
//! engine, closes the sensor-to-indicator loop over the bus, and drives the
//! polling loop.
//!
//! # Module Structure
//!
//! - [`controller`] - `Controller` struct, startup sequence and polling loop
//! - [`lever_sync`] - per-slot lever records and the change policy seam
//! - [`sim`] - simulated lever module for `--simulate` and tests
//! - [`error`] - controller error type
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  SetLeverState   ┌──────────────────┐  allow_change  ┌──────────────┐
//! │ lever module│ ───────────────► │ LeverSyncManager │ ─────────────► │ Interlocking │
//! │  (remote)   │ ◄─────────────── │                  │ ◄───────────── │  (engine)    │
//! └─────────────┘  SetLockState    └──────────────────┘  lock changes  └──────────────┘
//! ```

pub mod controller;
pub mod error;
pub mod lever_sync;
pub mod sim;

pub use crate::controller::{Controller, ControllerState};
pub use crate::error::ControllerError;
pub use crate::lever_sync::{AllowAll, LeverInfo, LeverPolicy, LeverSyncManager, PolicyFn};
pub use crate::sim::{LeverModuleSim, SimSlot};
