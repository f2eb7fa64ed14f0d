use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{RunError, SkipReason, TaskError};
use crate::executor::metrics::Metrics;
use crate::executor::timeline::TimelineEvent;
use crate::plan::{Strategy, TaskStatus, TaskType};

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every task succeeded.
    Success,
    /// The run completed but some tasks failed or were skipped.
    PartialFailure,
    /// The run was aborted (cancellation).
    Failed,
}

/// The designated final answer of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FinalOutput {
    /// The output task succeeded.
    Produced { task_id: String, output: String },
    /// The output task exists but did not succeed.
    Unavailable { task_id: String, status: TaskStatus },
    /// No aggregate task and more than one sink: no single output task.
    Undefined { sinks: Vec<String> },
}

impl FinalOutput {
    pub fn output(&self) -> Option<&str> {
        match self {
            FinalOutput::Produced { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            FinalOutput::Produced { task_id, .. } | FinalOutput::Unavailable { task_id, .. } => {
                Some(task_id)
            }
            FinalOutput::Undefined { .. } => None,
        }
    }
}

/// Terminal record of a single task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task_id: String,
    pub task_type: TaskType,
    pub level: usize,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

/// Result of executing a plan
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub run_id: String,
    pub goal: String,
    pub strategy: Strategy,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    pub metrics: Metrics,
    pub timeline: Vec<TimelineEvent>,
    pub final_output: FinalOutput,

    /// Resolved levels as task IDs
    pub levels: Vec<Vec<String>>,

    /// Effective concurrency limit applied to each level
    pub level_concurrency: Vec<usize>,

    /// Per-task detail, in plan order
    pub tasks: Vec<TaskReport>,
}

impl ExecutionResult {
    pub fn task(&self, task_id: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    pub fn output(&self) -> Option<&str> {
        self.final_output.output()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
