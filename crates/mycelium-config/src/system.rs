use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Settings for one actor system instance.
///
/// Every field has a default, so an empty TOML document is a valid config:
///
/// ```toml
/// address = "node-a"
/// throughput = 100
/// dead_letter_throttle_count = 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ActorSystemConfig {
    /// Address stamped on every locally spawned PID
    pub address: String,

    /// Shard count of the process registry; must be a power of two
    pub registry_shards: usize,

    /// Messages a mailbox processes per scheduling cycle before yielding
    pub throughput: usize,

    /// Window over which dead-letter logging is throttled
    pub dead_letter_throttle_interval_ms: u64,

    /// Dead letters logged per window; 0 disables dead-letter logging
    pub dead_letter_throttle_count: u32,

    /// Log dead letters that carry a sender (failed requests)
    pub dead_letter_request_logging: bool,

    /// Log supervision escalations at error level
    pub developer_supervision_logging: bool,
}

impl Default for ActorSystemConfig {
    fn default() -> Self {
        Self {
            address: "nonhost".to_string(),
            registry_shards: 1024,
            throughput: 300,
            dead_letter_throttle_interval_ms: 1000,
            dead_letter_throttle_count: 3,
            dead_letter_request_logging: true,
            developer_supervision_logging: false,
        }
    }
}

impl ActorSystemConfig {
    /// Load config from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate config from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: ActorSystemConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_throughput(mut self, throughput: usize) -> Self {
        self.throughput = throughput;
        self
    }

    pub fn with_dead_letter_throttle(mut self, interval: Duration, count: u32) -> Self {
        self.dead_letter_throttle_interval_ms =
            u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self.dead_letter_throttle_count = count;
        self
    }

    pub fn with_dead_letter_request_logging(mut self, enabled: bool) -> Self {
        self.dead_letter_request_logging = enabled;
        self
    }

    pub fn with_developer_supervision_logging(mut self, enabled: bool) -> Self {
        self.developer_supervision_logging = enabled;
        self
    }

    pub fn dead_letter_throttle_interval(&self) -> Duration {
        Duration::from_millis(self.dead_letter_throttle_interval_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "address must not be empty".to_string(),
            ));
        }

        if self.throughput == 0 {
            return Err(ConfigError::InvalidConfig(
                "throughput must be at least 1".to_string(),
            ));
        }

        // dashmap requires a power-of-two shard count greater than one
        if self.registry_shards < 2 || !self.registry_shards.is_power_of_two() {
            return Err(ConfigError::InvalidConfig(format!(
                "registry_shards must be a power of two > 1, got {}",
                self.registry_shards
            )));
        }

        Ok(())
    }
}
