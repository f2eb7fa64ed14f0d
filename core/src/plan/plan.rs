use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, GraphError};
use crate::executor::{Levels, TaskGraph};

use super::task::{Task, TaskType};

/// Declared execution strategy of a plan.
///
/// - `Sequential`: one task at a time, declaration order.
/// - `Parallel`: up to `max_parallel` tasks per level.
/// - `Adaptive`: like `Parallel`, but the limit is halved after a level with a
///   high failure rate and grows back otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Sequential,
    #[default]
    Parallel,
    Adaptive,
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(Strategy::Sequential),
            "parallel" => Ok(Strategy::Parallel),
            "adaptive" => Ok(Strategy::Adaptive),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Strategy::Sequential => "sequential",
            Strategy::Parallel => "parallel",
            Strategy::Adaptive => "adaptive",
        };
        f.write_str(name)
    }
}

/// An ordered collection of tasks forming a dependency graph.
///
/// Insertion order is the tie-break whenever several tasks are runnable at
/// once. The topological leveling is computed by [`Plan::validate`] and
/// cached until the topology changes.
#[derive(Debug, Clone)]
pub struct Plan {
    goal: String,
    strategy: Strategy,
    max_parallel: Option<usize>,
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
    levels: Option<Levels>,
}

impl Plan {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            strategy: Strategy::default(),
            max_parallel: None,
            tasks: Vec::new(),
            index: HashMap::new(),
            levels: None,
        }
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = Some(max_parallel);
        self
    }

    /// Builder variant of [`Plan::add_task`].
    pub fn with_task(mut self, task: Task) -> Result<Self, GraphError> {
        self.add_task(task)?;
        Ok(self)
    }

    pub fn set_strategy(&mut self, strategy: Strategy) -> &mut Self {
        self.strategy = strategy;
        self
    }

    pub fn set_max_parallel(&mut self, max_parallel: usize) -> &mut Self {
        self.max_parallel = Some(max_parallel);
        self
    }

    /// Append a task. Duplicate IDs are rejected immediately; dependency
    /// references are only checked by [`Plan::validate`].
    pub fn add_task(&mut self, task: Task) -> Result<&mut Self, GraphError> {
        if self.index.contains_key(&task.id) {
            return Err(GraphError::DuplicateTaskId(task.id));
        }
        self.index.insert(task.id.clone(), self.tasks.len());
        self.tasks.push(task);
        self.levels = None;
        Ok(self)
    }

    pub fn add<I, S>(
        &mut self,
        id: impl Into<String>,
        description: impl Into<String>,
        task_type: TaskType,
        dependencies: I,
    ) -> Result<&mut Self, GraphError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let task = Task::new(id, description)
            .with_type(task_type)
            .depends_on(dependencies);
        self.add_task(task)
    }

    /// Validate the graph and return its topological levels.
    ///
    /// The result is cached; calling this again without changing the plan is
    /// free.
    pub fn validate(&mut self) -> Result<&Levels, GraphError> {
        if self.levels.is_none() {
            let levels = TaskGraph::from_tasks(&self.tasks)?.resolve()?;
            self.levels = Some(levels);
        }
        self.levels.as_ref().ok_or(GraphError::EmptyPlan)
    }

    /// Cached levels, if the plan has been validated since its last change.
    pub fn levels(&self) -> Option<&Levels> {
        self.levels.as_ref()
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn max_parallel(&self) -> Option<usize> {
        self.max_parallel
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.index_of(id).map(|idx| &self.tasks[idx])
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub(crate) fn task_at(&self, idx: usize) -> &Task {
        &self.tasks[idx]
    }

    pub(crate) fn task_at_mut(&mut self, idx: usize) -> &mut Task {
        &mut self.tasks[idx]
    }

    pub(crate) fn reset_runtime_state(&mut self) {
        for task in &mut self.tasks {
            task.reset();
        }
    }
}
