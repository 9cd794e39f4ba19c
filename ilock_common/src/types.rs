//! Core vocabulary shared by the rule engine, the bus codec and the controller.
//!
//! All enums use `#[repr(u8)]` because each value travels as a single byte
//! inside a bus frame payload or identifier field.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::DEVICE_SLOT_STRIDE;

/// Identifier of a locking entity inside one interlocking registry.
///
/// Id `0` is reserved for the Fault Lock.
pub type LockingId = u8;

/// Bus address of a device (7-bit module address switch).
pub type DeviceId = u8;

/// Lever slot index on a single device.
pub type SlotId = u8;

// ─── Logical lock state ─────────────────────────────────────────────

/// Logical state of a locking entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum LockState {
    /// Lever at rest / mechanism engaged.
    #[default]
    On = 0,
    /// Lever pulled / mechanism released.
    Off = 1,
}

impl LockState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::On),
            1 => Some(Self::Off),
            _ => None,
        }
    }

    /// The opposite state.
    #[inline]
    pub const fn toggled(self) -> Self {
        match self {
            Self::On => Self::Off,
            Self::Off => Self::On,
        }
    }

    /// Logical state a lever must hold to agree with its sensed position.
    #[inline]
    pub const fn from_lever_state(state: LeverState) -> Self {
        match state {
            LeverState::Normal => Self::On,
            LeverState::Reversed => Self::Off,
        }
    }
}

// ─── Sensed lever position ──────────────────────────────────────────

/// Mechanical position of a lever as reported by its position sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum LeverState {
    /// Lever in the frame, at rest.
    #[default]
    Normal = 0,
    /// Lever pulled over.
    Reversed = 1,
}

impl LeverState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Normal),
            1 => Some(Self::Reversed),
            _ => None,
        }
    }

    /// The opposite position.
    #[inline]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Normal => Self::Reversed,
            Self::Reversed => Self::Normal,
        }
    }

    /// Sensed position that agrees with a logical state.
    #[inline]
    pub const fn from_lock_state(state: LockState) -> Self {
        match state {
            LockState::On => Self::Normal,
            LockState::Off => Self::Reversed,
        }
    }
}

/// Whether a sensed lever position agrees with a logical lock state.
///
/// `Normal` pairs with `On`, `Reversed` pairs with `Off`. A lever whose
/// sensed position does not match its logical state is faulted.
#[inline]
pub const fn lever_matches_lock(lever: LeverState, lock: LockState) -> bool {
    matches!(
        (lever, lock),
        (LeverState::Normal, LockState::On) | (LeverState::Reversed, LockState::Off)
    )
}

// ─── Lock rules ─────────────────────────────────────────────────────

/// Rule one entity imposes on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum LockingRule {
    /// No lock.
    #[default]
    Unlocked = 0,
    /// Lock regardless of state.
    LockedAny = 1,
    /// Lock only while On.
    LockedOn = 2,
    /// Lock only while Off.
    LockedOff = 3,
}

impl LockingRule {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Unlocked),
            1 => Some(Self::LockedAny),
            2 => Some(Self::LockedOn),
            3 => Some(Self::LockedOff),
            _ => None,
        }
    }

    /// Parse a rule name as written in layout files.
    ///
    /// Unrecognised names resolve to `Unlocked`, matching the lever layout
    /// files produced for the existing lever frames.
    pub fn from_name(name: &str) -> Self {
        match name {
            "LockedAny" => Self::LockedAny,
            "LockedOn" => Self::LockedOn,
            "LockedOff" => Self::LockedOff,
            _ => Self::Unlocked,
        }
    }

    /// `true` for every rule except `Unlocked`.
    #[inline]
    pub const fn is_locking(self) -> bool {
        !matches!(self, Self::Unlocked)
    }
}

// ─── Bus module types ───────────────────────────────────────────────

/// Kind of module attached to the bus. Embedded in the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ModuleType {
    /// Broadcast to every module.
    #[default]
    All = 0,
    /// Central interlocking controller.
    Core = 1,
    /// Remote lever module.
    Lever = 2,
}

impl ModuleType {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::All),
            1 => Some(Self::Core),
            2 => Some(Self::Lever),
            _ => None,
        }
    }
}

// ─── Device addressing ──────────────────────────────────────────────

/// Physical location of a lever: device address plus slot on that device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DeviceSlot {
    /// Bus address of the lever module.
    pub address: DeviceId,
    /// Slot on the module.
    pub slot: SlotId,
}

impl DeviceSlot {
    /// Create a device slot.
    #[inline]
    pub const fn new(address: DeviceId, slot: SlotId) -> Self {
        Self { address, slot }
    }

    /// Flattened ordering key: `address * 127 + slot`.
    #[inline]
    pub const fn flat_id(&self) -> u32 {
        self.address as u32 * DEVICE_SLOT_STRIDE + self.slot as u32
    }
}

impl Ord for DeviceSlot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.flat_id()
            .cmp(&other.flat_id())
            .then(self.address.cmp(&other.address))
            .then(self.slot.cmp(&other.slot))
    }
}

impl PartialOrd for DeviceSlot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DeviceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.slot)
    }
}
