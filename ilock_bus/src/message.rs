//! Message catalogue and typed messages.
//!
//! Every message type has exactly one [`MessageSpec`] row in [`CATALOGUE`]
//! giving its name, payload size and the module type it is addressed to.
//! Payload fields are one byte each, in declaration order.

use ilock_common::consts::MAX_FRAME_PAYLOAD;
use ilock_common::types::{DeviceId, LeverState, LockState, ModuleType, SlotId};
use static_assertions::const_assert;

use crate::error::{DecodeError, FrameError};
use crate::frame::Frame;
use crate::identifier::MessageId;

/// Message type byte carried in the low identifier byte.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Controller asks every module to announce itself.
    Init = 0,
    /// Module announces its address and module type.
    Register = 1,
    /// Lever module reports a sensed lever position.
    SetLeverState = 2,
    /// Controller sets the lock of one lever slot.
    SetLockState = 3,
    /// Controller switches lock indicators on or off.
    SetLockIndication = 4,
}

/// Number of message types.
pub const MESSAGE_TYPE_COUNT: usize = 5;

impl MessageType {
    pub const ALL: [MessageType; MESSAGE_TYPE_COUNT] = [
        Self::Init,
        Self::Register,
        Self::SetLeverState,
        Self::SetLockState,
        Self::SetLockIndication,
    ];

    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Init),
            1 => Some(Self::Register),
            2 => Some(Self::SetLeverState),
            3 => Some(Self::SetLockState),
            4 => Some(Self::SetLockIndication),
            _ => None,
        }
    }

    /// Catalogue row for this type.
    #[inline]
    pub const fn spec(self) -> MessageSpec {
        CATALOGUE[self as usize]
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Catalogue row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageSpec {
    pub kind: MessageType,
    pub name: &'static str,
    /// Exact payload length.
    pub payload_len: usize,
    /// Module type placed in the identifier.
    pub target: ModuleType,
}

/// Message catalogue, indexed by message type byte.
pub const CATALOGUE: [MessageSpec; MESSAGE_TYPE_COUNT] = [
    MessageSpec {
        kind: MessageType::Init,
        name: "Init",
        payload_len: 0,
        target: ModuleType::All,
    },
    MessageSpec {
        kind: MessageType::Register,
        name: "Register",
        payload_len: 2,
        target: ModuleType::Core,
    },
    MessageSpec {
        kind: MessageType::SetLeverState,
        name: "SetLeverState",
        payload_len: 4,
        target: ModuleType::Core,
    },
    MessageSpec {
        kind: MessageType::SetLockState,
        name: "SetLockState",
        payload_len: 3,
        target: ModuleType::Lever,
    },
    MessageSpec {
        kind: MessageType::SetLockIndication,
        name: "SetLockIndication",
        payload_len: 1,
        target: ModuleType::Lever,
    },
];

const_assert!(CATALOGUE[0].payload_len <= MAX_FRAME_PAYLOAD);
const_assert!(CATALOGUE[1].payload_len <= MAX_FRAME_PAYLOAD);
const_assert!(CATALOGUE[2].payload_len <= MAX_FRAME_PAYLOAD);
const_assert!(CATALOGUE[3].payload_len <= MAX_FRAME_PAYLOAD);
const_assert!(CATALOGUE[4].payload_len <= MAX_FRAME_PAYLOAD);

// ─── Codec ──────────────────────────────────────────────────────────

/// A typed message with a fixed payload layout.
pub trait BusMessage: Sized + Into<Message> {
    const KIND: MessageType;

    /// Write the payload. `out` is exactly the catalogue size.
    fn write_payload(&self, out: &mut [u8]);

    /// Read the payload. `payload` is exactly the catalogue size.
    fn read_payload(payload: &[u8]) -> Result<Self, DecodeError>;

    /// Decode a payload, rejecting any length other than the catalogue size.
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let expected = Self::KIND.spec().payload_len;
        if payload.len() != expected {
            return Err(DecodeError::LengthMismatch {
                kind: Self::KIND,
                expected,
                actual: payload.len(),
            });
        }
        Self::read_payload(payload)
    }

    /// Encode into a frame addressed to `destination`.
    fn to_frame(&self, destination: DeviceId) -> Result<Frame, FrameError> {
        let spec = Self::KIND.spec();
        let mut buf = [0u8; MAX_FRAME_PAYLOAD];
        let payload = &mut buf[..spec.payload_len];
        self.write_payload(payload);
        let id = MessageId::new(spec.target, destination, Self::KIND);
        Frame::new(id.pack(), payload)
    }
}

#[inline]
fn flag(value: u8) -> bool {
    value != 0
}

fn lever_state(value: u8) -> Result<LeverState, DecodeError> {
    LeverState::from_u8(value).ok_or(DecodeError::InvalidField {
        field: "lever state",
        value,
    })
}

fn lock_state(value: u8) -> Result<LockState, DecodeError> {
    LockState::from_u8(value).ok_or(DecodeError::InvalidField {
        field: "lock state",
        value,
    })
}

fn module_type(value: u8) -> Result<ModuleType, DecodeError> {
    ModuleType::from_u8(value).ok_or(DecodeError::InvalidField {
        field: "module type",
        value,
    })
}

// ─── Messages ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Init;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    pub device_id: DeviceId,
    pub module_type: ModuleType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetLeverState {
    pub device_id: DeviceId,
    pub slot: SlotId,
    pub state: LeverState,
    /// Sender's own view: sensed position disagrees with the commanded lock state.
    pub faulted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetLockState {
    pub slot: SlotId,
    pub state: LockState,
    pub locked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetLockIndication {
    pub show: bool,
}

impl BusMessage for Init {
    const KIND: MessageType = MessageType::Init;

    fn write_payload(&self, _out: &mut [u8]) {}

    fn read_payload(_payload: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self)
    }
}

impl BusMessage for Register {
    const KIND: MessageType = MessageType::Register;

    fn write_payload(&self, out: &mut [u8]) {
        out[0] = self.device_id;
        out[1] = self.module_type as u8;
    }

    fn read_payload(payload: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            device_id: payload[0],
            module_type: module_type(payload[1])?,
        })
    }
}

impl BusMessage for SetLeverState {
    const KIND: MessageType = MessageType::SetLeverState;

    fn write_payload(&self, out: &mut [u8]) {
        out[0] = self.device_id;
        out[1] = self.slot;
        out[2] = self.state as u8;
        out[3] = u8::from(self.faulted);
    }

    fn read_payload(payload: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            device_id: payload[0],
            slot: payload[1],
            state: lever_state(payload[2])?,
            faulted: flag(payload[3]),
        })
    }
}

impl BusMessage for SetLockState {
    const KIND: MessageType = MessageType::SetLockState;

    fn write_payload(&self, out: &mut [u8]) {
        out[0] = self.slot;
        out[1] = self.state as u8;
        out[2] = u8::from(self.locked);
    }

    fn read_payload(payload: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            slot: payload[0],
            state: lock_state(payload[1])?,
            locked: flag(payload[2]),
        })
    }
}

impl BusMessage for SetLockIndication {
    const KIND: MessageType = MessageType::SetLockIndication;

    fn write_payload(&self, out: &mut [u8]) {
        out[0] = u8::from(self.show);
    }

    fn read_payload(payload: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            show: flag(payload[0]),
        })
    }
}

// ─── Tagged message ─────────────────────────────────────────────────

/// Any catalogue message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Init(Init),
    Register(Register),
    SetLeverState(SetLeverState),
    SetLockState(SetLockState),
    SetLockIndication(SetLockIndication),
}

macro_rules! impl_from_message {
    ($($ty:ident),*) => {
        $(impl From<$ty> for Message {
            fn from(msg: $ty) -> Self {
                Message::$ty(msg)
            }
        })*
    };
}

impl_from_message!(Init, Register, SetLeverState, SetLockState, SetLockIndication);

impl Message {
    pub const fn kind(&self) -> MessageType {
        match self {
            Self::Init(_) => MessageType::Init,
            Self::Register(_) => MessageType::Register,
            Self::SetLeverState(_) => MessageType::SetLeverState,
            Self::SetLockState(_) => MessageType::SetLockState,
            Self::SetLockIndication(_) => MessageType::SetLockIndication,
        }
    }

    /// Encode into a frame addressed to `destination`.
    pub fn to_frame(&self, destination: DeviceId) -> Result<Frame, FrameError> {
        match self {
            Self::Init(m) => m.to_frame(destination),
            Self::Register(m) => m.to_frame(destination),
            Self::SetLeverState(m) => m.to_frame(destination),
            Self::SetLockState(m) => m.to_frame(destination),
            Self::SetLockIndication(m) => m.to_frame(destination),
        }
    }

    /// Decode a frame using its identifier's message type.
    pub fn from_frame(frame: &Frame) -> Result<Self, DecodeError> {
        let id = MessageId::unpack(frame.id());
        let kind = id
            .kind()
            .ok_or(DecodeError::UnknownType(id.message_type))?;
        let payload = frame.data();
        Ok(match kind {
            MessageType::Init => Init::decode(payload)?.into(),
            MessageType::Register => Register::decode(payload)?.into(),
            MessageType::SetLeverState => SetLeverState::decode(payload)?.into(),
            MessageType::SetLockState => SetLockState::decode(payload)?.into(),
            MessageType::SetLockIndication => SetLockIndication::decode(payload)?.into(),
        })
    }
}
