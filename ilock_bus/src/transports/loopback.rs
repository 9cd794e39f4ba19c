//! In-memory loopback bus.
//!
//! Every endpoint of a [`LoopbackBus`] sees the frames written by every
//! other endpoint, like nodes on one CAN segment. A writer never receives
//! its own frames. Each endpoint applies its configured [`Filter`] on read.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::error::TransportError;
use crate::frame::Frame;
use crate::identifier::{Filter, MessageId};
use crate::transport::{BusSettings, Transport};

/// Registry name.
pub const NAME: &str = "loopback";

#[derive(Debug, Default)]
struct BusInner {
    /// Receive queue per endpoint.
    queues: Vec<VecDeque<Frame>>,
}

/// Shared in-memory bus segment.
#[derive(Debug, Clone, Default)]
pub struct LoopbackBus {
    inner: Arc<Mutex<BusInner>>,
}

impl LoopbackBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new endpoint.
    pub fn endpoint(&self) -> LoopbackTransport {
        let index = {
            let mut inner = self.inner.lock();
            inner.queues.push(VecDeque::new());
            inner.queues.len() - 1
        };
        LoopbackTransport {
            bus: Arc::clone(&self.inner),
            index,
            filter: Filter::default(),
            settings: BusSettings::default(),
            started: false,
            fail_start: false,
        }
    }

    /// Number of attached endpoints.
    pub fn endpoints(&self) -> usize {
        self.inner.lock().queues.len()
    }
}

/// Two endpoints on a fresh bus.
pub fn pair() -> (LoopbackTransport, LoopbackTransport) {
    let bus = LoopbackBus::new();
    (bus.endpoint(), bus.endpoint())
}

/// One endpoint of a [`LoopbackBus`].
#[derive(Debug)]
pub struct LoopbackTransport {
    bus: Arc<Mutex<BusInner>>,
    index: usize,
    filter: Filter,
    settings: BusSettings,
    started: bool,
    fail_start: bool,
}

impl LoopbackTransport {
    /// Make `start` fail, for exercising bring-up errors.
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Filter applied on read.
    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn settings(&self) -> BusSettings {
        self.settings
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Frames waiting in this endpoint's queue, filtered or not.
    pub fn pending(&self) -> usize {
        self.bus
            .lock()
            .queues
            .get(self.index)
            .map_or(0, VecDeque::len)
    }
}

impl Transport for LoopbackTransport {
    fn name(&self) -> &'static str {
        NAME
    }

    fn configure(&mut self, filter: Filter, settings: &BusSettings) {
        debug!(
            endpoint = self.index,
            mask = filter.mask(),
            tx_pin = settings.tx_pin,
            rx_pin = settings.rx_pin,
            "loopback configured"
        );
        self.filter = filter;
        self.settings = *settings;
    }

    fn start(&mut self) -> Result<(), TransportError> {
        if self.fail_start {
            return Err(TransportError::StartFailed(format!(
                "loopback endpoint {} refused to start",
                self.index
            )));
        }
        self.started = true;
        info!(
            endpoint = self.index,
            clock_speed = self.settings.clock_speed,
            "loopback started"
        );
        Ok(())
    }

    fn read(&mut self) -> Option<Frame> {
        if !self.started {
            return None;
        }
        let mut inner = self.bus.lock();
        let queue = inner.queues.get_mut(self.index)?;
        while let Some(frame) = queue.pop_front() {
            if self.filter.accepts(&MessageId::unpack(frame.id())) {
                return Some(frame);
            }
            trace!(endpoint = self.index, id = frame.id(), "frame filtered");
        }
        None
    }

    fn write(&mut self, frame: &Frame) -> Result<(), TransportError> {
        if !self.started {
            return Err(TransportError::WriteFailed(
                "loopback endpoint not started".to_string(),
            ));
        }
        let mut inner = self.bus.lock();
        for (index, queue) in inner.queues.iter_mut().enumerate() {
            if index != self.index {
                queue.push_back(frame.clone());
            }
        }
        Ok(())
    }
}
