//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load TOML configuration files
//! and the configuration of the interlocking controller itself.
//!
//! # Usage
//!
//! ```rust,no_run
//! use ilock_common::config::{ConfigError, ConfigLoader, ControllerConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = ControllerConfig::load(Path::new("controller.toml"))?;
//!     config.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::consts::{DEFAULT_CLOCK_SPEED, DEFAULT_POLL_INTERVAL_US, MAX_MODULE_ADDR};
use crate::layout::{InterlockingLayout, LeverEntry, LockingEntry};
use crate::types::DeviceId;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML or JSON parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common configuration fields shared across applications.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "ilock-core-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Bus settings of the controller.
///
/// # TOML Example
///
/// ```toml
/// [bus]
/// transport = "loopback"
/// device_id = 0
/// tx_pin = 5
/// rx_pin = 4
/// clock_speed = 500000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    /// Registered transport name.
    #[serde(default = "default_transport")]
    pub transport: String,
    /// Bus address of this controller.
    #[serde(default)]
    pub device_id: DeviceId,
    /// Transmit pin handed to the transport.
    #[serde(default = "default_tx_pin")]
    pub tx_pin: u16,
    /// Receive pin handed to the transport.
    #[serde(default = "default_rx_pin")]
    pub rx_pin: u16,
    /// Bus clock speed in bits per second.
    #[serde(default = "default_clock_speed")]
    pub clock_speed: u32,
    /// Sleep between idle polls, in microseconds.
    #[serde(default = "default_poll_interval_us")]
    pub poll_interval_us: u64,
}

fn default_transport() -> String {
    "loopback".to_string()
}

fn default_tx_pin() -> u16 {
    5
}

fn default_rx_pin() -> u16 {
    4
}

fn default_clock_speed() -> u32 {
    DEFAULT_CLOCK_SPEED
}

fn default_poll_interval_us() -> u64 {
    DEFAULT_POLL_INTERVAL_US
}

fn default_true() -> bool {
    true
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            device_id: 0,
            tx_pin: default_tx_pin(),
            rx_pin: default_rx_pin(),
            clock_speed: default_clock_speed(),
            poll_interval_us: default_poll_interval_us(),
        }
    }
}

impl BusConfig {
    /// Validate bus settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.is_empty() {
            return Err(ConfigError::ValidationError(
                "bus.transport cannot be empty".to_string(),
            ));
        }
        if self.device_id > MAX_MODULE_ADDR {
            return Err(ConfigError::ValidationError(format!(
                "bus.device_id {} exceeds maximum address {MAX_MODULE_ADDR}",
                self.device_id
            )));
        }
        if self.clock_speed == 0 {
            return Err(ConfigError::ValidationError(
                "bus.clock_speed must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Complete controller configuration.
///
/// The lever layout is either inline (`[[levers]]` / `[[locking]]`) or
/// loaded from `layout_file` (TOML or legacy JSON), resolved relative to the
/// directory of the controller file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Shared application fields.
    pub shared: SharedConfig,
    /// Bus settings.
    #[serde(default)]
    pub bus: BusConfig,
    /// Whether lever modules show lock indication LEDs.
    #[serde(default = "default_true")]
    pub indicate_locks: bool,
    /// External layout file.
    #[serde(default)]
    pub layout_file: Option<PathBuf>,
    /// Inline lever table.
    #[serde(default)]
    pub levers: Vec<LeverEntry>,
    /// Inline lock rule table.
    #[serde(default)]
    pub locking: Vec<LockingEntry>,
}

impl ControllerConfig {
    /// Validate shared and bus sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.bus.validate()?;
        if self.layout_file.is_some() && !self.levers.is_empty() {
            return Err(ConfigError::ValidationError(
                "layout_file and inline [[levers]] are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the lever layout, reading `layout_file` when configured.
    ///
    /// # Arguments
    ///
    /// * `base_dir` - Directory used to resolve a relative `layout_file`
    pub fn resolve_layout(&self, base_dir: &Path) -> Result<InterlockingLayout, ConfigError> {
        let layout = match &self.layout_file {
            Some(path) => InterlockingLayout::load(&resolve_path(base_dir, path))?,
            None => InterlockingLayout {
                levers: self.levers.clone(),
                locking: self.locking.clone(),
            },
        };
        layout.validate()?;
        Ok(layout)
    }
}

/// Resolve a possibly relative path against a base directory.
pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = read_config_file(path)?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

/// Read a configuration file, mapping a missing file to `FileNotFound`.
pub(crate) fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound
        } else {
            ConfigError::ParseError(e.to_string())
        }
    })
}
