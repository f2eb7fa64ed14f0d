use std::sync::Arc;

use crate::plan::Strategy;

use super::traits::{ConcurrencyContext, ConcurrencyStrategyPlugin};
use super::types::AdaptiveConfig;

/// One task at a time.
pub struct SequentialConcurrency;

/// Always `max_parallel`.
pub struct FixedConcurrency;

/// Halves the limit after a level whose failure rate exceeded the threshold,
/// otherwise doubles it back toward `max_parallel`.
pub struct AdaptiveConcurrency {
    config: AdaptiveConfig,
}

impl AdaptiveConcurrency {
    pub fn new(config: AdaptiveConfig) -> Self {
        Self { config }
    }
}

impl ConcurrencyStrategyPlugin for SequentialConcurrency {
    fn name(&self) -> &str {
        "sequential"
    }

    fn calculate_concurrency(&self, _context: &ConcurrencyContext) -> usize {
        1
    }
}

impl ConcurrencyStrategyPlugin for FixedConcurrency {
    fn name(&self) -> &str {
        "fixed"
    }

    fn calculate_concurrency(&self, context: &ConcurrencyContext) -> usize {
        context.max_parallel.max(1)
    }
}

impl ConcurrencyStrategyPlugin for AdaptiveConcurrency {
    fn name(&self) -> &str {
        "adaptive"
    }

    fn calculate_concurrency(&self, context: &ConcurrencyContext) -> usize {
        let max = context.max_parallel.max(1);
        if context.level == 0 {
            return max;
        }

        let current = context.current_limit.clamp(1, max);
        let desired = match context.previous_failure_rate() {
            None => current,
            Some(rate) if rate > self.config.failure_threshold => current / 2,
            Some(_) => current.saturating_mul(2),
        };

        desired.clamp(1, max)
    }
}

/// Built-in policy for a declared strategy.
pub fn strategy_plugin(
    strategy: Strategy,
    adaptive: &AdaptiveConfig,
) -> Arc<dyn ConcurrencyStrategyPlugin> {
    match strategy {
        Strategy::Sequential => Arc::new(SequentialConcurrency),
        Strategy::Parallel => Arc::new(FixedConcurrency),
        Strategy::Adaptive => Arc::new(AdaptiveConcurrency::new(adaptive.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(level: usize, current: usize, dispatched: usize, failed: usize) -> ConcurrencyContext {
        ConcurrencyContext {
            level,
            runnable_tasks: 10,
            current_limit: current,
            max_parallel: 8,
            previous_dispatched: dispatched,
            previous_failed: failed,
        }
    }

    #[test]
    fn test_adaptive_concurrency() {
        let plugin = AdaptiveConcurrency::new(AdaptiveConfig::default());

        // First level starts at the configured maximum.
        assert_eq!(plugin.calculate_concurrency(&context(0, 8, 0, 0)), 8);
        // 6 of 10 failed -> throttle.
        assert_eq!(plugin.calculate_concurrency(&context(1, 8, 10, 6)), 4);
        assert_eq!(plugin.calculate_concurrency(&context(2, 1, 10, 6)), 1);
        // Exactly at the threshold is not "exceeded".
        assert_eq!(plugin.calculate_concurrency(&context(2, 2, 10, 5)), 4);
        // Recovery is capped at max_parallel.
        assert_eq!(plugin.calculate_concurrency(&context(3, 6, 4, 0)), 8);
        // Nothing dispatched: keep the limit.
        assert_eq!(plugin.calculate_concurrency(&context(3, 3, 0, 0)), 3);
    }

    #[test]
    fn test_fixed_and_sequential() {
        assert_eq!(FixedConcurrency.calculate_concurrency(&context(2, 1, 5, 5)), 8);
        assert_eq!(SequentialConcurrency.calculate_concurrency(&context(0, 8, 0, 0)), 1);
    }

    #[test]
    fn test_strategy_plugin_names() {
        let adaptive = AdaptiveConfig::default();
        assert_eq!(strategy_plugin(Strategy::Sequential, &adaptive).name(), "sequential");
        assert_eq!(strategy_plugin(Strategy::Parallel, &adaptive).name(), "fixed");
        assert_eq!(strategy_plugin(Strategy::Adaptive, &adaptive).name(), "adaptive");
    }
}
