//! Transport registry.
//!
//! Maps transport names to factories. Built at startup, populated via
//! `register()`, and consulted once when the dispatcher is started. No
//! global state.

use std::collections::HashMap;

use crate::error::TransportError;
use crate::transport::Transport;

/// Factory producing a fresh transport instance.
pub type TransportFactory = Box<dyn Fn() -> Box<dyn Transport> + Send + Sync>;

/// Registry of available transports.
pub struct TransportRegistry {
    factories: HashMap<&'static str, TransportFactory>,
}

impl TransportRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a transport factory.
    ///
    /// # Errors
    /// Returns `TransportError::AlreadyRegistered` if the name is taken.
    pub fn register<F>(&mut self, name: &'static str, factory: F) -> Result<(), TransportError>
    where
        F: Fn() -> Box<dyn Transport> + Send + Sync + 'static,
    {
        if self.factories.contains_key(name) {
            return Err(TransportError::AlreadyRegistered(name.to_string()));
        }
        self.factories.insert(name, Box::new(factory));
        Ok(())
    }

    /// Create a transport by name.
    ///
    /// # Errors
    /// Returns `TransportError::NotFound` if no transport has that name.
    pub fn create(&self, name: &str) -> Result<Box<dyn Transport>, TransportError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| TransportError::NotFound(name.to_string()))?;
        Ok(factory())
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new()
    }
}
