//! Message dispatcher.
//!
//! Owns the transport and this node's bus identity, and routes decoded
//! messages to one handler per message type. Handlers receive the caller's
//! context `C` and a [`BusLink`] for replies, so no handler needs global
//! state.
//!
//! # Lifecycle
//!
//! 1. `register_device()` - set identity and receive filter
//! 2. `on_message()` - install handlers (last registration wins)
//! 3. `start()` - configure and start the transport (once)
//! 4. `process_received()` - poll one frame per call

use ilock_common::consts::CONTROLLER_DEVICE_ID;
use ilock_common::types::{DeviceId, ModuleType};
use tracing::{debug, info, trace, warn};

use crate::error::{BusError, DecodeError};
use crate::frame::Frame;
use crate::identifier::{Filter, MessageId};
use crate::message::{BusMessage, Init, MESSAGE_TYPE_COUNT, Message, MessageType, Register};
use crate::transport::{BusSettings, Transport};

/// Outcome of one `process_received` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Not started, or nothing pending.
    Idle,
    /// Decoded and handed to the registered handler.
    Handled(MessageType),
    /// Unknown message type byte, or no handler registered.
    Ignored(u8),
    /// Payload failed the size or field check; dropped.
    Malformed(MessageType),
}

/// Transport plus identity; the sending half handed to handlers.
pub struct BusLink {
    transport: Option<Box<dyn Transport>>,
    identity: Option<(ModuleType, DeviceId)>,
    filter: Filter,
}

impl BusLink {
    fn new() -> Self {
        Self {
            transport: None,
            identity: None,
            filter: Filter::default(),
        }
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.transport.is_some()
    }

    /// Registered `(module type, device id)`, if any.
    #[inline]
    pub fn identity(&self) -> Option<(ModuleType, DeviceId)> {
        self.identity
    }

    /// Receive filter handed to the transport on start.
    #[inline]
    pub fn filter(&self) -> Filter {
        self.filter
    }

    /// Encode `msg` for `destination` and write it.
    ///
    /// Does nothing if the transport was never started.
    pub fn send_message(
        &mut self,
        destination: DeviceId,
        msg: impl Into<Message>,
    ) -> Result<(), BusError> {
        let Some(transport) = self.transport.as_mut() else {
            return Ok(());
        };
        let msg = msg.into();
        let frame = msg.to_frame(destination)?;
        trace!(kind = ?msg.kind(), destination, "sending");
        transport.write(&frame)?;
        Ok(())
    }

    fn read(&mut self) -> Option<Frame> {
        self.transport.as_mut()?.read()
    }
}

type Handler<C> = Box<dyn FnMut(&mut C, &[u8], &mut BusLink) -> Result<(), DecodeError>>;

/// Per-type handler table over a context `C`.
pub struct MessageDispatcher<C> {
    link: BusLink,
    handlers: [Option<Handler<C>>; MESSAGE_TYPE_COUNT],
}

impl<C> Default for MessageDispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> MessageDispatcher<C> {
    pub fn new() -> Self {
        Self {
            link: BusLink::new(),
            handlers: std::array::from_fn(|_| None),
        }
    }

    /// Set this node's identity and recompute its receive filter.
    ///
    /// Takes effect on the transport at the next `start`.
    pub fn register_device(&mut self, module_type: ModuleType, device_id: DeviceId) {
        self.link.identity = Some((module_type, device_id));
        self.link.filter = Filter::new(module_type, device_id);
        debug!(?module_type, device_id, "device registered");
    }

    /// Configure and start `transport`.
    ///
    /// On failure the dispatcher stays unstarted and `start` may be retried.
    ///
    /// # Errors
    ///
    /// - `BusError::AlreadyStarted` if a transport is already running
    /// - `BusError::Transport` if the transport fails to start
    pub fn start(
        &mut self,
        mut transport: Box<dyn Transport>,
        settings: &BusSettings,
    ) -> Result<(), BusError> {
        if self.link.is_started() {
            return Err(BusError::AlreadyStarted);
        }
        transport.configure(self.link.filter, settings);
        transport.start()?;
        info!(transport = transport.name(), "bus started");
        self.link.transport = Some(transport);
        Ok(())
    }

    /// Install the handler for message type `M`, replacing any previous one.
    pub fn on_message<M, F>(&mut self, mut handler: F)
    where
        C: 'static,
        M: BusMessage + 'static,
        F: FnMut(&mut C, M, &mut BusLink) + 'static,
    {
        let erased: Handler<C> = Box::new(
            move |ctx: &mut C, payload: &[u8], link: &mut BusLink| -> Result<(), DecodeError> {
                let msg = M::decode(payload)?;
                handler(ctx, msg, link);
                Ok(())
            },
        );
        self.handlers[M::KIND.index()] = Some(erased);
    }

    /// Whether a handler is installed for `kind`.
    pub fn has_handler(&self, kind: MessageType) -> bool {
        self.handlers[kind.index()].is_some()
    }

    /// Poll the transport for one frame and dispatch it.
    ///
    /// A valid `Init` is answered with `Register` to the controller when an
    /// identity is registered, whether or not an `Init` handler exists.
    pub fn process_received(&mut self, ctx: &mut C) -> Dispatch {
        let Some(frame) = self.link.read() else {
            return Dispatch::Idle;
        };
        let id = MessageId::unpack(frame.id());
        let Some(kind) = id.kind() else {
            trace!(message_type = id.message_type, "unknown message type ignored");
            return Dispatch::Ignored(id.message_type);
        };

        let outcome = match self.handlers[kind.index()].as_mut() {
            Some(handler) => match handler(ctx, frame.data(), &mut self.link) {
                Ok(()) => Dispatch::Handled(kind),
                Err(err) => {
                    debug!(?kind, %err, "malformed frame dropped");
                    Dispatch::Malformed(kind)
                }
            },
            None => {
                trace!(?kind, "no handler registered");
                Dispatch::Ignored(id.message_type)
            }
        };

        if kind == MessageType::Init && Init::decode(frame.data()).is_ok() {
            self.announce();
        }
        outcome
    }

    fn announce(&mut self) {
        let Some((module_type, device_id)) = self.link.identity else {
            return;
        };
        let register = Register {
            device_id,
            module_type,
        };
        if let Err(err) = self.link.send_message(CONTROLLER_DEVICE_ID, register) {
            warn!(%err, "failed to answer Init");
        }
    }

    /// Send a message through the dispatcher's own link.
    pub fn send_message(
        &mut self,
        destination: DeviceId,
        msg: impl Into<Message>,
    ) -> Result<(), BusError> {
        self.link.send_message(destination, msg)
    }

    #[inline]
    pub fn link(&self) -> &BusLink {
        &self.link
    }

    #[inline]
    pub fn link_mut(&mut self) -> &mut BusLink {
        &mut self.link
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.link.is_started()
    }
}
