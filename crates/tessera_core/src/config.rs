//! Store and scheduler configuration
//!
//! Read by the entity manager and job scheduler at construction time; the
//! core never mutates it.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default batching threshold for one parallel task.
pub const DEFAULT_TARGET_WORKLOAD_PER_THREAD: u32 = 5000;

/// Core configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcsConfig {
    /// Estimated workload one task should carry before the scheduler opens
    /// another one.
    pub target_workload_per_thread: u32,
    pub pool: PoolGrowth,
}

/// Fixed-increment growth policy of archetype pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolGrowth {
    pub initial_capacity: usize,
    pub grow_increment: usize,
    pub shrink_increment: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("config value '{field}' must be positive")]
    NotPositive { field: &'static str },
}

impl Default for EcsConfig {
    fn default() -> Self {
        Self {
            target_workload_per_thread: DEFAULT_TARGET_WORKLOAD_PER_THREAD,
            pool: PoolGrowth::default(),
        }
    }
}

impl Default for PoolGrowth {
    fn default() -> Self {
        Self {
            initial_capacity: 100,
            grow_increment: 50,
            shrink_increment: 50,
        }
    }
}

impl EcsConfig {
    /// Parse and validate a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EcsConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_workload_per_thread == 0 {
            return Err(ConfigError::NotPositive {
                field: "target_workload_per_thread",
            });
        }
        self.pool.validate()
    }
}

impl PoolGrowth {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_capacity == 0 {
            return Err(ConfigError::NotPositive {
                field: "pool.initial_capacity",
            });
        }
        if self.grow_increment == 0 {
            return Err(ConfigError::NotPositive {
                field: "pool.grow_increment",
            });
        }
        if self.shrink_increment == 0 {
            return Err(ConfigError::NotPositive {
                field: "pool.shrink_increment",
            });
        }
        Ok(())
    }
}
