//! Bus error types.

use thiserror::Error;

use crate::message::MessageType;

/// Frame construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Identifier does not fit an extended (29-bit) identifier.
    #[error("Identifier {0:#x} exceeds 29 bits")]
    IdentifierOutOfRange(u32),

    /// Payload longer than a frame can carry.
    #[error("Payload of {0} bytes exceeds frame capacity")]
    PayloadTooLong(usize),
}

/// Payload decoding errors. Frames failing to decode are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Message type byte not in the catalogue.
    #[error("Unknown message type {0}")]
    UnknownType(u8),

    /// Payload length differs from the catalogue size.
    #[error("{kind:?} expects {expected} payload bytes, got {actual}")]
    LengthMismatch {
        kind: MessageType,
        expected: usize,
        actual: usize,
    },

    /// Enum field byte out of range.
    #[error("Invalid {field} value {value}")]
    InvalidField { field: &'static str, value: u8 },
}

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No transport registered under this name.
    #[error("Transport not found: {0}")]
    NotFound(String),

    /// A transport with this name is already registered.
    #[error("Transport already registered: {0}")]
    AlreadyRegistered(String),

    /// Transport bring-up failed.
    #[error("Transport start failed: {0}")]
    StartFailed(String),

    /// Frame could not be written.
    #[error("Transport write failed: {0}")]
    WriteFailed(String),
}

/// Dispatcher errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// `start` called on a dispatcher that already owns a transport.
    #[error("Dispatcher already started")]
    AlreadyStarted,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Frame(#[from] FrameError),
}
