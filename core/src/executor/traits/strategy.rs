/// Per-level concurrency policy.
///
/// Called once before every level is admitted; the returned value is the
/// admission gate size for that level.
pub trait ConcurrencyStrategyPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn calculate_concurrency(&self, context: &ConcurrencyContext) -> usize;
}

/// Runtime feedback available to a concurrency strategy.
#[derive(Debug, Clone)]
pub struct ConcurrencyContext {
    /// Index of the level about to be admitted.
    pub level: usize,
    /// Number of runnable tasks in that level.
    pub runnable_tasks: usize,
    /// Limit applied to the previous level (`max_parallel` for level 0).
    pub current_limit: usize,
    /// Caller-configured upper bound.
    pub max_parallel: usize,
    /// Tasks dispatched in the previous level.
    pub previous_dispatched: usize,
    /// Tasks that failed in the previous level.
    pub previous_failed: usize,
}

impl ConcurrencyContext {
    /// Failure rate of the previous level, `None` if nothing was dispatched.
    pub fn previous_failure_rate(&self) -> Option<f64> {
        if self.previous_dispatched == 0 {
            None
        } else {
            Some(self.previous_failed as f64 / self.previous_dispatched as f64)
        }
    }
}
