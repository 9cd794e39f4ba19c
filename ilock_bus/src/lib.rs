//! # Interlocking Bus
//!
//! Binary framing, addressing and dispatch between the central controller
//! and remote lever modules.
//!
//! - [`frame`] - identifier + up to 8 payload bytes
//! - [`identifier`] - `module(7) | destination(8) | message type(8)` layout and receive filters
//! - [`message`] - message catalogue, typed messages and their byte layouts
//! - [`transport`] / [`transport_registry`] / [`transports`] - pluggable bus backends
//! - [`dispatcher`] - per-type handler table, identity and `Init`/`Register` handshake
//!
//! Everything here is single-threaded and polled: one
//! [`MessageDispatcher::process_received`] call handles at most one frame.

pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod identifier;
pub mod message;
pub mod transport;
pub mod transport_registry;
pub mod transports;

pub use dispatcher::{BusLink, Dispatch, MessageDispatcher};
pub use error::{BusError, DecodeError, FrameError, TransportError};
pub use frame::Frame;
pub use identifier::{Filter, MessageId};
pub use message::{
    BusMessage, Init, Message, MessageType, Register, SetLeverState, SetLockIndication,
    SetLockState,
};
pub use transport::{BusSettings, Transport};
pub use transport_registry::TransportRegistry;
