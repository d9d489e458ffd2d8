//! Platform configuration
//!
//! Sources are layered in order: built-in defaults, an optional TOML file,
//! then `VNVRAM_`-prefixed environment variables (`__` separates nested
//! keys, e.g. `VNVRAM_HEAP__SIZE=4096`).

use crate::error::{Error, Result};
use crate::pool::{validate_classes, PoolClass, PLATFORM_HEAP_NAME};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "VNVRAM";

/// Default platform heap budget (bytes)
pub const DEFAULT_HEAP_SIZE: usize = 2 * 1024;

/// Host command carrying a saved NVRAM record
pub const DEFAULT_PUSH_NVRAM_COMMAND: u16 = 0x2905;
/// Device event reporting a written record
pub const DEFAULT_WRITE_NVRAM_EVENT: u16 = 0x2982;
/// Device event reporting a deleted record
pub const DEFAULT_DELETE_NVRAM_EVENT: u16 = 0x2983;

/// Complete platform configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PlatformConfig {
    pub heap: HeapConfig,
    pub pool: PoolConfig,
    pub transport: TransportConfig,
}

/// Heap the pool arena is carved from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapConfig {
    pub name: String,
    /// Total budget (bytes); must cover the arena plus its use map
    pub size: usize,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            name: PLATFORM_HEAP_NAME.to_string(),
            size: DEFAULT_HEAP_SIZE,
        }
    }
}

/// Size classes of the pool allocator, smallest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub classes: Vec<PoolClass>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            classes: vec![
                PoolClass::new(32, 2),
                PoolClass::new(80, 2),
                PoolClass::new(284, 2),
                PoolClass::new(572, 1),
            ],
        }
    }
}

/// Host link opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub push_nvram_command: u16,
    pub write_nvram_event: u16,
    pub delete_nvram_event: u16,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            push_nvram_command: DEFAULT_PUSH_NVRAM_COMMAND,
            write_nvram_event: DEFAULT_WRITE_NVRAM_EVENT,
            delete_nvram_event: DEFAULT_DELETE_NVRAM_EVENT,
        }
    }
}

impl PlatformConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&Self::default())
            .map_err(|e| Error::Config(format!("Failed to encode defaults: {}", e)))?;

        let mut builder = Config::builder().add_source(defaults);
        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| Error::Config(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document; missing sections take their defaults
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize TOML: {}", e)))
    }

    /// Check everything that can be checked before touching memory
    pub fn validate(&self) -> Result<()> {
        validate_classes(&self.pool.classes).map_err(|e| Error::Config(e.to_string()))?;

        let t = &self.transport;
        if t.push_nvram_command == t.write_nvram_event
            || t.push_nvram_command == t.delete_nvram_event
            || t.write_nvram_event == t.delete_nvram_event
        {
            return Err(Error::Config(format!(
                "transport opcodes must be distinct: push=0x{:04x} write=0x{:04x} delete=0x{:04x}",
                t.push_nvram_command, t.write_nvram_event, t.delete_nvram_event
            )));
        }

        Ok(())
    }
}
