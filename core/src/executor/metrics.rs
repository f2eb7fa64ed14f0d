use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::plan::TaskStatus;
use crate::util::time::serialize_duration_ms;

/// Aggregate numbers for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub task_count: usize,
    pub succeeded_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
    /// `succeeded_count / task_count`
    pub success_rate: f64,
    /// Mean duration of tasks that actually ran (succeeded or failed).
    #[serde(rename = "avg_task_duration_ms", serialize_with = "serialize_duration_ms")]
    pub avg_task_duration: Duration,
    #[serde(rename = "total_duration_ms", serialize_with = "serialize_duration_ms")]
    pub total_duration: Duration,
}

#[derive(Debug, Default)]
struct Counters {
    succeeded: usize,
    failed: usize,
    skipped: usize,
    ran_duration: Duration,
}

/// Running counters, updated as each task reaches a terminal state.
///
/// Ratios are only computed in [`MetricsCollector::finalize`].
#[derive(Debug, Default)]
pub struct MetricsCollector {
    counters: Mutex<Counters>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, status: TaskStatus, duration: Duration) {
        let mut counters = match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match status {
            TaskStatus::Succeeded => {
                counters.succeeded += 1;
                counters.ran_duration += duration;
            }
            TaskStatus::Failed => {
                counters.failed += 1;
                counters.ran_duration += duration;
            }
            TaskStatus::Skipped => counters.skipped += 1,
            TaskStatus::Pending | TaskStatus::Running => {
                debug!(?status, "ignoring non-terminal status in metrics");
            }
        }
    }

    /// Number of tasks recorded so far.
    pub fn recorded(&self) -> usize {
        let counters = match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        counters.succeeded + counters.failed + counters.skipped
    }

    pub fn finalize(&self, task_count: usize, total_duration: Duration) -> Metrics {
        let counters = match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let ran = counters.succeeded + counters.failed;
        let success_rate = if task_count == 0 {
            0.0
        } else {
            counters.succeeded as f64 / task_count as f64
        };
        let avg_task_duration = if ran == 0 {
            Duration::ZERO
        } else {
            counters.ran_duration / u32::try_from(ran).unwrap_or(u32::MAX)
        };

        Metrics {
            task_count,
            succeeded_count: counters.succeeded,
            failed_count: counters.failed,
            skipped_count: counters.skipped,
            success_rate,
            avg_task_duration,
            total_duration,
        }
    }
}
