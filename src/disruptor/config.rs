//! Configuration Management
//!
//! Sequencer settings as a serde structure, so a pipeline can be described in
//! a JSON file and loaded at startup:
//!
//! ```json
//! {
//!   "buffer_size": 4096,
//!   "claim_strategy": "single-threaded",
//!   "wait_strategy": "sleeping",
//!   "time": { "timeout_micros": 500, "sleep_micros": 50 }
//! }
//! ```
//!
//! Every field is optional and falls back to its default.

use crate::disruptor::{ClaimStrategyOption, DisruptorError, Result, WaitStrategyOption};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Wait timeouts and sleep periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// Default timeout of the timeout-blocking wait strategy, and the idle
    /// tick period of processors that ask for one
    pub timeout_micros: u64,
    /// Sleep period of the sleeping wait strategy
    pub sleep_micros: u64,
}

impl TimeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_micros(self.timeout_micros)
    }

    pub fn sleep(&self) -> Duration {
        Duration::from_micros(self.sleep_micros)
    }

    /// Idle timeout for batch processors, `None` when disabled with zero
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.timeout_micros > 0).then(|| self.timeout())
    }
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            timeout_micros: 1_000,
            sleep_micros: 100,
        }
    }
}

/// Settings for building a [`Sequencer`](crate::disruptor::Sequencer)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisruptorConfig {
    /// Requested slot count, rounded up to a power of two
    pub buffer_size: usize,
    pub claim_strategy: ClaimStrategyOption,
    pub wait_strategy: WaitStrategyOption,
    pub time: TimeConfig,
}

impl Default for DisruptorConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            claim_strategy: ClaimStrategyOption::default(),
            wait_strategy: WaitStrategyOption::default(),
            time: TimeConfig::default(),
        }
    }
}

impl DisruptorConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the settings are usable
    ///
    /// # Errors
    /// Returns `DisruptorError::InvalidBufferSize` for a zero or unaddressable
    /// buffer size, and `DisruptorError::InvalidConfig` for a zero timeout with
    /// the timeout-blocking strategy.
    pub fn validate(&self) -> Result<()> {
        crate::disruptor::ceil_to_power_of_two(self.buffer_size)?;

        if self.wait_strategy == WaitStrategyOption::TimeoutBlocking
            && self.time.timeout_micros == 0
        {
            return Err(DisruptorError::InvalidConfig(
                "timeout-blocking wait strategy needs a non-zero timeout_micros".to_string(),
            ));
        }
        Ok(())
    }
}
