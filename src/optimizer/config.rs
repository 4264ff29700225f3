//! Optimizer configuration
//!
//! Loaded from a JSON file. Every field is optional and falls back to the
//! default below.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::{OptimizerError, OptimizerResult};

/// Configuration for an `Optimizer` instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// TTL applied by `cached_query_default` (default: 60)
    #[serde(default = "default_ttl_seconds")]
    pub default_ttl_seconds: u64,

    /// How long a selected plan is reused for the same query (default: 300)
    #[serde(default = "default_plan_ttl_seconds")]
    pub plan_ttl_seconds: u64,

    /// Maximum memoized result sets (default: 10000)
    #[serde(default = "default_result_cache_capacity")]
    pub result_cache_capacity: usize,

    /// Maximum memoized plan decisions (default: 1000)
    #[serde(default = "default_plan_cache_capacity")]
    pub plan_cache_capacity: usize,

    /// Maximum remembered query pairs (default: 1000)
    #[serde(default = "default_correlation_capacity")]
    pub correlation_capacity: usize,

    /// Seed for plan selection; unset draws from OS entropy
    #[serde(default)]
    pub rng_seed: Option<u64>,

    /// Emit a JSON log line per optimizer event (default: false)
    #[serde(default)]
    pub log_decisions: bool,
}

fn default_ttl_seconds() -> u64 {
    60
}
fn default_plan_ttl_seconds() -> u64 {
    300
}
fn default_result_cache_capacity() -> usize {
    10_000
}
fn default_plan_cache_capacity() -> usize {
    1_000
}
fn default_correlation_capacity() -> usize {
    1_000
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: default_ttl_seconds(),
            plan_ttl_seconds: default_plan_ttl_seconds(),
            result_cache_capacity: default_result_cache_capacity(),
            plan_cache_capacity: default_plan_cache_capacity(),
            correlation_capacity: default_correlation_capacity(),
            rng_seed: None,
            log_decisions: false,
        }
    }
}

impl OptimizerConfig {
    /// Default configuration with a fixed selection seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng_seed: Some(seed),
            ..Default::default()
        }
    }

    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> OptimizerResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            OptimizerError::invalid_config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let config: OptimizerConfig = serde_json::from_str(&content)
            .map_err(|e| OptimizerError::invalid_config(format!("invalid config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject zero capacities
    pub fn validate(&self) -> OptimizerResult<()> {
        if self.result_cache_capacity == 0 {
            return Err(OptimizerError::invalid_config(
                "result_cache_capacity must be > 0",
            ));
        }
        if self.plan_cache_capacity == 0 {
            return Err(OptimizerError::invalid_config(
                "plan_cache_capacity must be > 0",
            ));
        }
        if self.correlation_capacity == 0 {
            return Err(OptimizerError::invalid_config(
                "correlation_capacity must be > 0",
            ));
        }
        Ok(())
    }
}
