mod code;
pub mod executor;
pub mod task;

pub use code::ErrorCode;
pub use executor::{ConfigError, ExecutorError, GraphError, RunError};
pub use task::{SkipReason, StepError, TaskError, TransitionError};
