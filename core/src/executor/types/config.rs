use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::plan::Strategy;

/// Executor configuration (`[executor]` table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Forces every plan onto this strategy, e.g. `sequential` to reproduce
    /// a run deterministically. Unset means "use the plan's strategy".
    #[serde(default, rename = "strategy")]
    pub strategy_override: Option<Strategy>,

    /// Used when a plan does not set its own `max_parallel`.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Per-task timeout applied when a task has no override. Unset means the
    /// step runner owns timeouts.
    #[serde(default)]
    pub task_timeout_ms: Option<u64>,

    /// How long running tasks may keep going after cancellation.
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,

    #[serde(default)]
    pub adaptive: AdaptiveConfig,
}

fn default_max_parallel() -> usize {
    4
}

fn default_cancel_grace_ms() -> u64 {
    5_000
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            strategy_override: None,
            max_parallel: default_max_parallel(),
            task_timeout_ms: None,
            cancel_grace_ms: default_cancel_grace_ms(),
            adaptive: AdaptiveConfig::default(),
        }
    }
}

impl ExecutorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_parallel == 0 {
            return Err(ConfigError::InvalidConcurrency(self.max_parallel));
        }
        self.adaptive.validate()
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_ms.map(Duration::from_millis)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    /// A level whose failure rate exceeds this halves the next level's limit.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: f64,
}

fn default_failure_threshold() -> f64 {
    0.5
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
        }
    }
}

impl AdaptiveConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.failure_threshold) {
            return Err(ConfigError::InvalidThreshold(self.failure_threshold));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ExecutorConfig::default();
        assert_eq!(cfg.max_parallel, 4);
        assert_eq!(cfg.cancel_grace(), Duration::from_secs(5));
        assert!(cfg.task_timeout().is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_parallelism_rejected() {
        let cfg = ExecutorConfig {
            max_parallel: 0,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidConcurrency(0))
        ));
    }

    #[test]
    fn test_threshold_out_of_range() {
        let cfg = AdaptiveConfig {
            failure_threshold: 1.5,
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidThreshold(_))));
    }
}
