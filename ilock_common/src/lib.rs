//! Interlocking Common Library
//!
//! This crate provides the shared vocabulary of the interlocking workspace:
//! identifiers, lever/lock enums, device addressing, constants and
//! configuration loading.
//!
//! # Module Structure
//!
//! - [`types`] - Locking ids, lock/lever states, rules, module types, device slots
//! - [`consts`] - System-wide numeric limits and defaults
//! - [`config`] - Configuration loading traits and controller configuration
//! - [`layout`] - Lever and lock rule layout (TOML tables or legacy JSON)
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use ilock_common::prelude::*;
//!
//! let slot = DeviceSlot::new(5, 3);
//! assert_eq!(slot.flat_id(), 5 * 127 + 3);
//! assert!(lever_matches_lock(LeverState::Normal, LockState::On));
//! ```

pub mod config;
pub mod consts;
pub mod layout;
pub mod prelude;
pub mod types;
