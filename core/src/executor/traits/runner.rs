use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::StepError;
use crate::plan::TaskType;

/// Output of a finished dependency, handed to `Aggregate` tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyResult {
    pub task_id: String,
    pub output: String,
}

/// Everything a runner gets to see about one task.
#[derive(Debug, Clone)]
pub struct StepInput {
    pub task_id: String,
    pub description: String,
    pub task_type: TaskType,
    /// Dependency results in declared order. Empty unless `task_type` is
    /// `Aggregate`.
    pub dependency_results: Vec<DependencyResult>,
    /// Cancelled when the run is aborted; runners may stop early.
    pub cancel: CancellationToken,
}

/// The collaborator that performs a task's actual work.
///
/// Invoked concurrently for distinct tasks, so implementations must be
/// `Send + Sync`. A runner may enforce its own timeout and report it as
/// [`StepError::Timeout`].
#[async_trait]
pub trait StepRunner: Send + Sync {
    async fn run(&self, input: StepInput) -> Result<String, StepError>;
}
