//! Rule engine errors.

use ilock_common::consts::MAX_LOCKING_ID;
use thiserror::Error;

/// Errors raised while building an interlocking.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A lock rule names a lever that was never declared.
    #[error("Lever not found: {0}")]
    LeverNotFound(String),

    /// A locking with this name already exists.
    #[error("Duplicate locking name: {0}")]
    DuplicateName(String),

    /// Every locking id is taken.
    #[error("No locking ids left (maximum {MAX_LOCKING_ID})")]
    CapacityExhausted,
}
