//! Controller error type.

use ilock_bus::{BusError, TransportError};
use ilock_common::config::ConfigError;
use ilock_engine::EngineError;

/// Errors raised while building or starting the controller.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Configuration or layout could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Layout rejected by the rule engine
    #[error("Interlocking error: {0}")]
    Engine(#[from] EngineError),

    /// Bus bring-up or send failure
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// Transport lookup failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
