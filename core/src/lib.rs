//! Dependency-graph planning and bounded parallel execution.
//!
//! Build a [`Plan`] of tasks with dependencies, hand it to an
//! [`ExecutionEngine`] together with a [`StepRunner`] that performs the
//! actual work, and get back an [`ExecutionResult`] with per-task outcomes,
//! metrics and an ordered timeline.

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod plan;
pub mod util;

pub use config::{EngineConfig, LoggingConfig};
pub use error::{
    ConfigError, ExecutorError, GraphError, RunError, SkipReason, StepError, TaskError,
};
pub use executor::{
    ExecutionEngine, ExecutionResult, ExecutorConfig, FinalOutput, RunStatus, StepInput,
    StepRunner,
};
pub use plan::{Plan, Strategy, Task, TaskStatus, TaskType};
pub use tokio_util::sync::CancellationToken;
