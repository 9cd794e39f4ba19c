//! System-wide constants for the interlocking workspace.
//!
//! Single source of truth for numeric limits, wire sizes and default paths.

use static_assertions::const_assert;

/// Reserved locking id of the system Fault Lock.
pub const FAULT_LOCK_ID: u8 = 0;

/// Highest locking id that can be allocated (ids are one byte on the wire).
pub const MAX_LOCKING_ID: u8 = u8::MAX;

/// Highest addressable lever module (7-bit address switch).
pub const MAX_MODULE_ADDR: u8 = 127;

/// Multiplier used to flatten a device slot into a single ordering key.
pub const DEVICE_SLOT_STRIDE: u32 = MAX_MODULE_ADDR as u32;

/// Maximum payload bytes carried by one bus frame.
pub const MAX_FRAME_PAYLOAD: usize = 8;

/// Width of an extended bus identifier in bits.
pub const IDENTIFIER_BITS: u32 = 29;

/// Largest value an extended identifier can hold.
pub const MAX_IDENTIFIER: u32 = (1 << IDENTIFIER_BITS) - 1;

/// Default bus clock speed in bits per second.
pub const DEFAULT_CLOCK_SPEED: u32 = 500_000;

/// Default idle poll interval of the controller loop in microseconds.
pub const DEFAULT_POLL_INTERVAL_US: u64 = 1000;

/// Bus address of the central controller.
pub const CONTROLLER_DEVICE_ID: u8 = 0;

/// Default controller configuration path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ilock/controller.toml";

// Module type (7) + destination (8) + message type (8) must fit an extended id.
const_assert!(7 + 8 + 8 <= IDENTIFIER_BITS);
const_assert!(MAX_MODULE_ADDR as u32 <= 0x7F);
