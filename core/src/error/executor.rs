use serde::Serialize;
use thiserror::Error;

use super::code::ErrorCode;
use super::task::TransitionError;
use crate::plan::TaskStatus;

/// Structural problems with a plan's dependency graph.
///
/// Always detected before any task runs and always fatal to the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Duplicate task ID: {0}")]
    DuplicateTaskId(String),

    #[error("Dependency not found: task '{task_id}' depends on '{dependency}'")]
    UnknownDependency { task_id: String, dependency: String },

    #[error("Circular dependency detected: {}", .path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    #[error("Plan contains no tasks")]
    EmptyPlan,
}

/// Invalid engine or plan configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid concurrency: max_parallel must be >= 1 (got {0})")]
    InvalidConcurrency(usize),

    #[error("unknown strategy '{0}' (expected sequential, parallel or adaptive)")]
    UnknownStrategy(String),

    #[error("invalid adaptive failure threshold {0} (expected 0.0..=1.0)")]
    InvalidThreshold(f64),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("logging setup failed: {0}")]
    Logging(String),
}

/// Errors returned by `ExecutionEngine::execute` before any task runs.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The engine tried to move a task through an illegal state change.
    #[error("internal state error: {0}")]
    Transition(#[from] TransitionError),
}

/// Run-level error reported on an `ExecutionResult`.
///
/// Only set when the run was cancelled or the task designated to produce
/// the final output did not succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunError {
    #[error("run cancelled")]
    Cancelled,

    #[error("final output unavailable: task '{task_id}' ended {status:?}")]
    OutputUnavailable { task_id: String, status: TaskStatus },
}

impl RunError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Cancelled => ErrorCode::Cancelled,
            Self::OutputUnavailable { .. } => ErrorCode::Skipped,
        }
    }
}

impl GraphError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::DuplicateTaskId(_) => ErrorCode::ValidationError,
            Self::UnknownDependency { .. } => ErrorCode::DependencyError,
            Self::CycleDetected { .. } => ErrorCode::CircularDependency,
            Self::EmptyPlan => ErrorCode::EmptyPlan,
        }
    }
}

impl ExecutorError {
    /// Map executor error to report error code
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Graph(e) => e.error_code(),
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Transition(_) => ErrorCode::GeneralError,
        }
    }
}
