//! Transport contract.
//!
//! A transport moves raw [`Frame`]s. It is polled: `read` never blocks and
//! returns `None` when nothing is pending.
//!
//! # Lifecycle
//!
//! 1. `configure()` - receive filter and pin/clock settings, before start
//! 2. `start()` - bring the bus up
//! 3. `read()` / `write()` - from the single polling context

use ilock_common::config::BusConfig;
use ilock_common::consts::DEFAULT_CLOCK_SPEED;

use crate::error::TransportError;
use crate::frame::Frame;
use crate::identifier::Filter;

/// Pin and clock settings handed to a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusSettings {
    pub tx_pin: u16,
    pub rx_pin: u16,
    /// Bits per second.
    pub clock_speed: u32,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            tx_pin: 5,
            rx_pin: 4,
            clock_speed: DEFAULT_CLOCK_SPEED,
        }
    }
}

impl From<&BusConfig> for BusSettings {
    fn from(config: &BusConfig) -> Self {
        Self {
            tx_pin: config.tx_pin,
            rx_pin: config.rx_pin,
            clock_speed: config.clock_speed,
        }
    }
}

/// A bus backend.
pub trait Transport: Send {
    /// Registry name (e.g. "loopback").
    fn name(&self) -> &'static str;

    /// Apply the receive filter and bus settings. Called before `start`.
    fn configure(&mut self, filter: Filter, settings: &BusSettings);

    /// Bring the bus up.
    ///
    /// # Errors
    /// `TransportError::StartFailed` if the hardware cannot be initialized.
    fn start(&mut self) -> Result<(), TransportError>;

    /// Poll for one received frame.
    fn read(&mut self) -> Option<Frame>;

    /// Queue one frame for transmission.
    fn write(&mut self, frame: &Frame) -> Result<(), TransportError>;
}
