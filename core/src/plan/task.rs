use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SkipReason, TaskError, TransitionError};
use crate::executor::TaskLike;

/// Kind of work a task performs.
///
/// Only `Aggregate` changes executor behaviour: it receives the results of
/// its dependencies (in declared order) alongside its own description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    #[default]
    Action,
    Observation,
    Aggregate,
}

impl TaskType {
    pub fn receives_dependency_results(self) -> bool {
        matches!(self, TaskType::Aggregate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Skipped
        )
    }

    fn can_transition_to(self, to: TaskStatus) -> bool {
        matches!(
            (self, to),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Pending, TaskStatus::Skipped)
                | (TaskStatus::Running, TaskStatus::Succeeded)
                | (TaskStatus::Running, TaskStatus::Failed)
                | (TaskStatus::Running, TaskStatus::Skipped)
        )
    }
}

/// A single node of a plan.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub task_type: TaskType,
    /// Declared dependency IDs. Order matters for `Aggregate` input.
    pub dependencies: Vec<String>,
    /// Overrides the engine-wide task timeout.
    pub timeout: Option<Duration>,

    status: TaskStatus,
    result: Option<String>,
    error: Option<TaskError>,
    skip_reason: Option<SkipReason>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            task_type: TaskType::default(),
            dependencies: Vec::new(),
            timeout: None,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            skip_reason: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn with_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        self.skip_reason.as_ref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Wall-clock time between start and finish. Zero for tasks that never ran.
    pub fn duration(&self) -> Duration {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => (end - start).to_std().unwrap_or_default(),
            _ => Duration::ZERO,
        }
    }

    pub(crate) fn mark_running(&mut self, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Running)?;
        self.started_at = Some(at);
        Ok(())
    }

    pub(crate) fn mark_succeeded(
        &mut self,
        output: String,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Succeeded)?;
        self.result = Some(output);
        self.finished_at = Some(at);
        Ok(())
    }

    pub(crate) fn mark_failed(
        &mut self,
        error: TaskError,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Failed)?;
        self.error = Some(error);
        self.finished_at = Some(at);
        Ok(())
    }

    pub(crate) fn mark_skipped(
        &mut self,
        reason: SkipReason,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Skipped)?;
        self.skip_reason = Some(reason);
        self.finished_at = Some(at);
        Ok(())
    }

    /// Clear runtime state so the task can take part in a fresh execution.
    pub(crate) fn reset(&mut self) {
        self.status = TaskStatus::Pending;
        self.result = None;
        self.error = None;
        self.skip_reason = None;
        self.started_at = None;
        self.finished_at = None;
    }

    fn transition(&mut self, to: TaskStatus) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::FromTerminalState {
                task_id: self.id.clone(),
                state: self.status,
            });
        }
        if !self.status.can_transition_to(to) {
            return Err(TransitionError::InvalidTransition {
                task_id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

impl TaskLike for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}
