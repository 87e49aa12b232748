use crate::error::EngineError;
use crate::error::Result;
use serde::Deserialize;
use serde::Serialize;
use std::time::Duration;

/// Configuration for the catalog filtering engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Quiescence window for coalescing filter changes, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Operations slower than this are flagged as anomalies
    #[serde(default = "default_slow_operation_ms")]
    pub slow_operation_ms: u64,

    /// Number of samples kept per operation for the rolling average
    #[serde(default = "default_metrics_window")]
    pub metrics_window: usize,

    /// Record performance samples at all
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_debounce_ms() -> u64 {
    250
}

fn default_slow_operation_ms() -> u64 {
    100
}

fn default_metrics_window() -> usize {
    50
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            slow_operation_ms: default_slow_operation_ms(),
            metrics_window: default_metrics_window(),
            metrics_enabled: true,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document; missing keys fall back to their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.metrics_window == 0 {
            return Err(EngineError::Config(
                "metrics_window must be > 0".to_string(),
            ));
        }

        if self.slow_operation_ms == 0 {
            return Err(EngineError::Config(
                "slow_operation_ms must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn slow_operation_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_operation_ms)
    }
}
