//! Built-in transports.

pub mod loopback;

use crate::error::TransportError;
use crate::transport_registry::TransportRegistry;

/// Name of the in-memory transport.
pub const LOOPBACK: &str = loopback::NAME;

/// Registry with a `loopback` transport whose endpoints all share `bus`.
///
/// # Errors
/// Returns `TransportError::AlreadyRegistered` if a built-in name collides.
pub fn default_registry(bus: &loopback::LoopbackBus) -> Result<TransportRegistry, TransportError> {
    let mut registry = TransportRegistry::new();
    let bus = bus.clone();
    registry.register(LOOPBACK, move || Box::new(bus.endpoint()))?;
    Ok(registry)
}
