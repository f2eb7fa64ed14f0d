//! Plan construction: tasks, their lifecycle, and the plan container.

mod plan;
mod task;

pub use plan::{Plan, Strategy};
pub use task::{Task, TaskStatus, TaskType};
