//! Plan Executor for Task Dependency Graph (DAG) Execution
//!
//! This module drives a [`Plan`](crate::plan::Plan) to completion:
//! - Task dependency graph construction and validation
//! - Longest-path leveling (tasks of a level are mutually independent)
//! - Circular dependency detection
//! - Per-level bounded parallelism with pluggable concurrency policies
//! - Cascading skips, per-task timeouts and cooperative cancellation
//! - Metrics and an ordered, thread-safe event timeline
//!
//! # Architecture
//!
//! ```text
//! Plan { tasks }
//!   ↓
//! TaskGraph::from_tasks()      → duplicate / unknown-dependency checks
//!   ↓
//! TaskGraph::resolve()         → EmptyPlan / CycleDetected, Levels
//!   ↓
//! ExecutionEngine::execute()   → per level:
//!     cascade skips → ConcurrencyStrategyPlugin → Semaphore-gated dispatch
//!     → StepRunner → Timeline / Metrics → level barrier
//!   ↓
//! ExecutionResult
//! ```

mod concurrency;
mod engine;
mod graph;
mod metrics;
mod output;
mod scheduler;
mod timeline;
pub mod traits;
pub mod types;

pub use concurrency::{
    strategy_plugin, AdaptiveConcurrency, FixedConcurrency, SequentialConcurrency,
};
pub use engine::{ExecutionEngine, ExecutionEngineBuilder};
pub use graph::{Levels, TaskGraph, TaskLike};
pub use metrics::{Metrics, MetricsCollector};
pub use timeline::{TimelineEvent, TimelineEventType, TimelineRecorder};
pub use traits::{
    ConcurrencyContext, ConcurrencyStrategyPlugin, DependencyResult, OutputRendererPlugin,
    RenderEvent, StepInput, StepRunner,
};
pub use types::{
    AdaptiveConfig, ExecutionResult, ExecutorConfig, FinalOutput, RunStatus, TaskReport,
};
