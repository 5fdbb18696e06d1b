//! Serializable engine configuration, loadable from TOML.
//!
//! Every field has a default, so an empty file (or a partial one) is a valid
//! configuration:
//!
//! ```toml
//! history_capacity = 2000
//! optimization_interval_secs = 1800
//!
//! [optimizer]
//! method = "random"
//! metric = "sortino"
//! n_iterations = 80
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::logging::LogConfig;
use crate::optimizer::OptimizerConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Points kept per symbol; oldest are evicted first.
    pub history_capacity: usize,
    /// Period of the background optimization scheduler.
    pub optimization_interval_secs: u64,
    /// Look-back window for scheduled optimizations.
    pub lookback_days: i64,
    /// Strategies are skipped when fewer points fall inside the look-back.
    pub min_optimization_points: usize,
    /// Upper bound on how long `stop()` waits for the scheduler.
    pub shutdown_timeout_ms: u64,
    pub optimizer: OptimizerConfig,
    pub logging: LogConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: 1_000,
            optimization_interval_secs: 3_600,
            lookback_days: 30,
            min_optimization_points: 100,
            shutdown_timeout_ms: 5_000,
            optimizer: OptimizerConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid("history_capacity must be positive".into()));
        }
        if self.optimization_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "optimization_interval_secs must be positive".into(),
            ));
        }
        if self.lookback_days <= 0 {
            return Err(ConfigError::Invalid("lookback_days must be positive".into()));
        }
        if self.optimizer.grid_points == 0 {
            return Err(ConfigError::Invalid("optimizer.grid_points must be positive".into()));
        }
        Ok(())
    }

    pub fn optimization_interval(&self) -> Duration {
        Duration::from_secs(self.optimization_interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
