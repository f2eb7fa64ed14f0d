use crate::error::{SkipReason, TaskError};
use crate::executor::types::{Metrics, RunStatus};
use crate::plan::Strategy;

/// Output renderer plugin (receives the executor's event stream)
pub trait OutputRendererPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn format(&self) -> &str;
    fn supports_streaming(&self) -> bool {
        false
    }
    fn render(&self, event: &RenderEvent);
}

/// Unified render event type
#[derive(Debug, Clone)]
pub enum RenderEvent {
    RunStart {
        run_id: String,
        goal: String,
        strategy: Strategy,
        total_tasks: usize,
        total_levels: usize,
    },
    Plan {
        run_id: String,
        levels: Vec<Vec<String>>,
    },
    LevelStart {
        run_id: String,
        level: usize,
        task_ids: Vec<String>,
        concurrency: usize,
    },
    TaskStart {
        run_id: String,
        task_id: String,
        level: usize,
    },
    TaskComplete {
        run_id: String,
        task_id: String,
        level: usize,
        duration_ms: u64,
        error: Option<TaskError>,
    },
    TaskSkipped {
        run_id: String,
        task_id: String,
        level: usize,
        reason: SkipReason,
    },
    LevelEnd {
        run_id: String,
        level: usize,
        succeeded: usize,
        failed: usize,
        skipped: usize,
    },
    RunEnd {
        run_id: String,
        status: RunStatus,
        metrics: Metrics,
    },
}
