use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use super::code::ErrorCode;
use crate::plan::TaskStatus;
use crate::util::time::millis;

/// Per-task failure. Captured on the task, never unwinds the executor.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskError {
    #[error("runner failure: {message}")]
    RunnerFailure { message: String },

    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("cancelled")]
    Cancelled,
}

impl TaskError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::RunnerFailure { .. } => ErrorCode::RunnerError,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::Cancelled => ErrorCode::Cancelled,
        }
    }
}

/// Why a task was skipped without (or before finishing) execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// An ancestor failed. `origin` is the failed ancestor, `dependency` the
    /// direct dependency through which the failure arrived.
    Cascade { origin: String, dependency: String },
    /// The run was cancelled before this task could finish.
    Cancelled,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cascade { origin, dependency } if origin == dependency => {
                write!(f, "dependency '{dependency}' failed")
            }
            Self::Cascade { origin, dependency } => {
                write!(f, "dependency '{dependency}' skipped (failed ancestor '{origin}')")
            }
            Self::Cancelled => write!(f, "run cancelled"),
        }
    }
}

/// Error returned by a `StepRunner`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("{0}")]
    Failed(String),

    /// The runner enforced its own timeout.
    #[error("runner timed out after {0:?}")]
    Timeout(Duration),

    /// The runner observed the cancellation token and stopped.
    #[error("runner cancelled")]
    Cancelled,
}

impl From<StepError> for TaskError {
    fn from(err: StepError) -> Self {
        match err {
            StepError::Failed(message) => TaskError::RunnerFailure { message },
            StepError::Timeout(after) => TaskError::Timeout {
                timeout_ms: millis(after),
            },
            StepError::Cancelled => TaskError::Cancelled,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("task '{task_id}': invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("task '{task_id}': cannot transition from terminal state {state:?}")]
    FromTerminalState { task_id: String, state: TaskStatus },
}
