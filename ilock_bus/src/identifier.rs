//! Identifier bit layout and receive filters.
//!
//! ```text
//!  28      23 22         16 15          8 7           0
//! ┌──────────┬─────────────┬─────────────┬─────────────┐
//! │ (unused) │ module (7)  │ destination │ msg type    │
//! └──────────┴─────────────┴─────────────┴─────────────┘
//! ```

use ilock_common::consts::CONTROLLER_DEVICE_ID;
use ilock_common::types::{DeviceId, ModuleType};

use crate::message::MessageType;

const MODULE_SHIFT: u32 = 16;
const DESTINATION_SHIFT: u32 = 8;
const MODULE_MASK: u32 = 0x7F;
const BYTE_MASK: u32 = 0xFF;

/// Unpacked identifier fields.
///
/// Fields are kept raw so that identifiers with unknown module or message
/// types still round-trip; use [`module`](Self::module) and
/// [`kind`](Self::kind) for typed views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MessageId {
    /// Target module type (7 bits).
    pub module_type: u8,
    /// Destination device address.
    pub destination: DeviceId,
    /// Message type byte.
    pub message_type: u8,
}

impl MessageId {
    pub const fn new(module: ModuleType, destination: DeviceId, kind: MessageType) -> Self {
        Self {
            module_type: module as u8,
            destination,
            message_type: kind as u8,
        }
    }

    /// Pack into an identifier. The module field is truncated to 7 bits.
    #[inline]
    pub const fn pack(&self) -> u32 {
        ((self.module_type as u32 & MODULE_MASK) << MODULE_SHIFT)
            | ((self.destination as u32) << DESTINATION_SHIFT)
            | self.message_type as u32
    }

    /// Split an identifier into its fields. Bits above the module field are ignored.
    #[inline]
    pub const fn unpack(id: u32) -> Self {
        Self {
            module_type: ((id >> MODULE_SHIFT) & MODULE_MASK) as u8,
            destination: ((id >> DESTINATION_SHIFT) & BYTE_MASK) as u8,
            message_type: (id & BYTE_MASK) as u8,
        }
    }

    #[inline]
    pub const fn module(&self) -> Option<ModuleType> {
        ModuleType::from_u8(self.module_type)
    }

    #[inline]
    pub const fn kind(&self) -> Option<MessageType> {
        MessageType::from_u8(self.message_type)
    }
}

/// Receive filter for one `(module type, address)` identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Filter {
    pub module_type: ModuleType,
    pub address: DeviceId,
}

impl Filter {
    pub const fn new(module_type: ModuleType, address: DeviceId) -> Self {
        Self {
            module_type,
            address,
        }
    }

    /// Hardware acceptance mask: message type bits are free, module and
    /// address bits are constrained.
    #[inline]
    pub const fn mask(&self) -> u32 {
        !((self.module_type as u32) << MODULE_SHIFT) & !((self.address as u32) << DESTINATION_SHIFT)
    }

    /// Hardware acceptance code.
    #[inline]
    pub const fn code(&self) -> u32 {
        0
    }

    /// Software acceptance used by transports without filter hardware.
    ///
    /// A frame is accepted when its module field is `All` or this filter's
    /// module type, and its destination is the broadcast address or this
    /// filter's address. A filter for module `All` or address 0 leaves the
    /// respective field open.
    pub fn accepts(&self, id: &MessageId) -> bool {
        let module_ok = self.module_type == ModuleType::All
            || id.module_type == ModuleType::All as u8
            || id.module_type == self.module_type as u8;
        let destination_ok = self.address == CONTROLLER_DEVICE_ID
            || id.destination == CONTROLLER_DEVICE_ID
            || id.destination == self.address;
        module_ok && destination_ok
    }
}
