use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ConfigError, ExecutorError, RunError, SkipReason, TaskError};
use crate::plan::{Plan, Strategy, TaskStatus, TaskType};
use crate::util::time::millis;

use super::concurrency::strategy_plugin;
use super::graph::TaskGraph;
use super::metrics::MetricsCollector;
use super::output::Emitter;
use super::scheduler::{run_level, Dispatch, LevelContext, LevelOutcome};
use super::timeline::{TimelineEventType, TimelineRecorder};
use super::traits::{
    ConcurrencyContext, ConcurrencyStrategyPlugin, DependencyResult, OutputRendererPlugin,
    StepInput, StepRunner,
};
use super::types::{ExecutionResult, ExecutorConfig, FinalOutput, RunStatus, TaskReport};

/// Execution engine for plans
///
/// Walks a validated plan level by level, dispatching runnable tasks to the
/// [`StepRunner`] under a per-level concurrency limit. A single engine can
/// execute any number of plans; nothing is shared between runs.
pub struct ExecutionEngine {
    runner: Arc<dyn StepRunner>,
    config: ExecutorConfig,
    renderer: Option<Arc<dyn OutputRendererPlugin>>,
    concurrency_strategy: Option<Arc<dyn ConcurrencyStrategyPlugin>>,
}

pub struct ExecutionEngineBuilder {
    runner: Arc<dyn StepRunner>,
    config: ExecutorConfig,
    renderer: Option<Arc<dyn OutputRendererPlugin>>,
    concurrency_strategy: Option<Arc<dyn ConcurrencyStrategyPlugin>>,
}

impl ExecutionEngine {
    pub fn new(runner: Arc<dyn StepRunner>) -> Self {
        Self::builder(runner).build()
    }

    pub fn builder(runner: Arc<dyn StepRunner>) -> ExecutionEngineBuilder {
        ExecutionEngineBuilder::new(runner)
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute a plan to completion.
    pub async fn execute(&self, plan: &mut Plan) -> Result<ExecutionResult, ExecutorError> {
        self.execute_with_cancel(plan, CancellationToken::new()).await
    }

    /// Execute a plan, stopping early when `cancel` fires.
    ///
    /// Graph and configuration problems are returned as errors before any
    /// task runs. Everything after that, including task failures and
    /// cancellation, is reported on the returned [`ExecutionResult`].
    pub async fn execute_with_cancel(
        &self,
        plan: &mut Plan,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult, ExecutorError> {
        let strategy = self.config.strategy_override.unwrap_or(plan.strategy());
        let max_parallel = plan.max_parallel().unwrap_or(self.config.max_parallel);
        if max_parallel == 0 && strategy != Strategy::Sequential {
            return Err(ConfigError::InvalidConcurrency(max_parallel).into());
        }
        self.config.adaptive.validate()?;

        let levels = plan.validate()?.clone();
        let (dependencies, sinks) = {
            let graph = TaskGraph::from_tasks(plan.tasks())?;
            let deps: Vec<Vec<usize>> = (0..plan.len())
                .map(|idx| graph.dependencies_of(idx).to_vec())
                .collect();
            (deps, graph.sinks())
        };
        let mut level_of = vec![0usize; plan.len()];
        for (level, members) in levels.iter().enumerate() {
            for &idx in members {
                level_of[idx] = level;
            }
        }
        plan.reset_runtime_state();

        let policy = self
            .concurrency_strategy
            .clone()
            .unwrap_or_else(|| strategy_plugin(strategy, &self.config.adaptive));
        let level_ids = levels.to_ids(plan.tasks());
        let emitter = Emitter::new(Uuid::new_v4().to_string(), self.renderer.clone());
        let timeline = TimelineRecorder::new();
        let metrics = MetricsCollector::new();
        let start = Instant::now();

        emitter.emit_run_start(plan.goal(), strategy, plan.len(), levels.len());
        emitter.emit_plan(&level_ids);
        debug!(
            run_id = emitter.run_id(),
            policy = policy.name(),
            max_parallel,
            "concurrency policy selected"
        );

        let mut limit = max_parallel.max(1);
        let mut level_concurrency = Vec::with_capacity(levels.len());
        let mut previous_dispatched = 0;
        let mut previous_failed = 0;

        for (level, members) in levels.iter().enumerate() {
            if cancel.is_cancelled() {
                for &idx in members {
                    let reason = SkipReason::Cancelled;
                    skip_task(plan, idx, level, reason, &timeline, &metrics, &emitter)?;
                }
                continue;
            }

            // Cascade first: tasks with a failed or skipped dependency never run.
            let mut runnable = Vec::with_capacity(members.len());
            let mut skipped = 0;
            for &idx in members {
                match cascade_reason(plan, &dependencies[idx]) {
                    Some(reason) => {
                        skip_task(plan, idx, level, reason, &timeline, &metrics, &emitter)?;
                        skipped += 1;
                    }
                    None => runnable.push(idx),
                }
            }

            // Fully cascade-skipped levels get no concurrency entry.
            if runnable.is_empty() {
                debug!(run_id = emitter.run_id(), level, "level fully skipped");
                emitter.emit_level_end(level, 0, 0, skipped);
                continue;
            }

            let context = ConcurrencyContext {
                level,
                runnable_tasks: runnable.len(),
                current_limit: limit,
                max_parallel: max_parallel.max(1),
                previous_dispatched,
                previous_failed,
            };
            limit = policy.calculate_concurrency(&context).max(1);
            level_concurrency.push(limit);

            emitter.emit_level_start(
                level,
                runnable.iter().map(|&idx| plan.task_at(idx).id.clone()).collect(),
                limit,
            );

            let dispatches = runnable
                .iter()
                .map(|&idx| self.prepare_dispatch(plan, idx, &dependencies[idx], &cancel))
                .collect();
            let ctx = LevelContext {
                level,
                runner: self.runner.as_ref(),
                timeline: &timeline,
                metrics: &metrics,
                emitter: &emitter,
                cancel: &cancel,
                cancel_grace: self.config.cancel_grace(),
            };
            let outcome = run_level(&ctx, dispatches, limit).await;

            previous_dispatched = outcome.dispatched();
            previous_failed = outcome.failed();
            skipped += outcome.abandoned.len() + outcome.not_admitted.len();
            let succeeded = outcome.finished.len() - previous_failed;

            apply_outcome(plan, level, outcome, &timeline, &metrics, &emitter)?;
            emitter.emit_level_end(level, succeeded, previous_failed, skipped);
        }

        let cancelled = cancel.is_cancelled();
        let metrics = metrics.finalize(plan.len(), start.elapsed());
        let final_output = resolve_final_output(plan, &sinks);

        let (status, error) = if cancelled {
            warn!(run_id = emitter.run_id(), "run cancelled");
            (RunStatus::Failed, Some(RunError::Cancelled))
        } else {
            let status = if metrics.succeeded_count == metrics.task_count {
                RunStatus::Success
            } else {
                RunStatus::PartialFailure
            };
            let error = match &final_output {
                FinalOutput::Unavailable { task_id, status } => Some(RunError::OutputUnavailable {
                    task_id: task_id.clone(),
                    status: *status,
                }),
                _ => None,
            };
            (status, error)
        };

        emitter.emit_run_end(status, &metrics);

        let tasks = plan
            .tasks()
            .iter()
            .enumerate()
            .map(|(idx, task)| TaskReport {
                task_id: task.id.clone(),
                task_type: task.task_type,
                level: level_of[idx],
                status: task.status(),
                result: task.result().map(str::to_string),
                error: task.error().cloned(),
                skip_reason: task.skip_reason().cloned(),
                started_at: task.started_at(),
                finished_at: task.finished_at(),
                duration_ms: millis(task.duration()),
            })
            .collect();

        Ok(ExecutionResult {
            run_id: emitter.run_id().to_string(),
            goal: plan.goal().to_string(),
            strategy,
            status,
            error,
            metrics,
            timeline: timeline.into_events(),
            final_output,
            levels: level_ids,
            level_concurrency,
            tasks,
        })
    }

    fn prepare_dispatch(
        &self,
        plan: &Plan,
        idx: usize,
        dependencies: &[usize],
        cancel: &CancellationToken,
    ) -> Dispatch {
        let task = plan.task_at(idx);
        let dependency_results = if task.task_type.receives_dependency_results() {
            dependencies
                .iter()
                .map(|&dep| {
                    let dep = plan.task_at(dep);
                    DependencyResult {
                        task_id: dep.id.clone(),
                        output: dep.result().unwrap_or_default().to_string(),
                    }
                })
                .collect()
        } else {
            Vec::new()
        };

        Dispatch {
            idx,
            input: StepInput {
                task_id: task.id.clone(),
                description: task.description.clone(),
                task_type: task.task_type,
                dependency_results,
                cancel: cancel.child_token(),
            },
            timeout: task.timeout.or_else(|| self.config.task_timeout()),
        }
    }
}

impl ExecutionEngineBuilder {
    pub fn new(runner: Arc<dyn StepRunner>) -> Self {
        Self {
            runner,
            config: ExecutorConfig::default(),
            renderer: None,
            concurrency_strategy: None,
        }
    }

    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn OutputRendererPlugin>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Replace the built-in policy derived from the plan's strategy.
    pub fn concurrency_strategy(mut self, strategy: Arc<dyn ConcurrencyStrategyPlugin>) -> Self {
        self.concurrency_strategy = Some(strategy);
        self
    }

    pub fn build(self) -> ExecutionEngine {
        ExecutionEngine {
            runner: self.runner,
            config: self.config,
            renderer: self.renderer,
            concurrency_strategy: self.concurrency_strategy,
        }
    }
}

/// Why a task cannot run, judged from its (terminal) dependencies.
///
/// Names the first non-succeeded dependency in declared order and carries
/// the original failed ancestor through chains of skips.
fn cascade_reason(plan: &Plan, dependencies: &[usize]) -> Option<SkipReason> {
    dependencies.iter().find_map(|&dep| {
        let dep = plan.task_at(dep);
        match dep.status() {
            TaskStatus::Failed => Some(SkipReason::Cascade {
                origin: dep.id.clone(),
                dependency: dep.id.clone(),
            }),
            TaskStatus::Skipped => Some(match dep.skip_reason() {
                Some(SkipReason::Cascade { origin, .. }) => SkipReason::Cascade {
                    origin: origin.clone(),
                    dependency: dep.id.clone(),
                },
                _ => SkipReason::Cancelled,
            }),
            _ => None,
        }
    })
}

fn skip_task(
    plan: &mut Plan,
    idx: usize,
    level: usize,
    reason: SkipReason,
    timeline: &TimelineRecorder,
    metrics: &MetricsCollector,
    emitter: &Emitter,
) -> Result<(), ExecutorError> {
    let task = plan.task_at_mut(idx);
    let event = timeline.record(
        TimelineEventType::TaskSkipped,
        &task.id,
        reason.to_string(),
        Duration::ZERO,
    );
    metrics.record(TaskStatus::Skipped, Duration::ZERO);
    emitter.emit_task_skipped(&task.id, level, reason.clone());
    task.mark_skipped(reason, event.timestamp)?;
    Ok(())
}

fn apply_outcome(
    plan: &mut Plan,
    level: usize,
    outcome: LevelOutcome,
    timeline: &TimelineRecorder,
    metrics: &MetricsCollector,
    emitter: &Emitter,
) -> Result<(), ExecutorError> {
    for finished in outcome.finished {
        let task = plan.task_at_mut(finished.idx);
        task.mark_running(finished.started_at)?;
        match finished.outcome {
            Ok(output) => task.mark_succeeded(output, finished.finished_at)?,
            Err(err) => {
                if matches!(err, TaskError::Timeout { .. }) {
                    warn!(run_id = emitter.run_id(), task_id = %task.id, "task timed out");
                }
                task.mark_failed(err, finished.finished_at)?;
            }
        }
    }

    for abandoned in outcome.abandoned {
        plan.task_at_mut(abandoned.idx)
            .mark_running(abandoned.started_at)?;
        skip_task(
            plan,
            abandoned.idx,
            level,
            SkipReason::Cancelled,
            timeline,
            metrics,
            emitter,
        )?;
    }

    for idx in outcome.not_admitted {
        let reason = SkipReason::Cancelled;
        skip_task(plan, idx, level, reason, timeline, metrics, emitter)?;
    }

    Ok(())
}

/// The last `Aggregate` task in declaration order, else the unique sink.
fn resolve_final_output(plan: &Plan, sinks: &[usize]) -> FinalOutput {
    let designated = plan
        .tasks()
        .iter()
        .rposition(|t| t.task_type == TaskType::Aggregate)
        .or(match sinks {
            [only] => Some(*only),
            _ => None,
        });

    let Some(idx) = designated else {
        return FinalOutput::Undefined {
            sinks: sinks.iter().map(|&i| plan.task_at(i).id.clone()).collect(),
        };
    };

    let task = plan.task_at(idx);
    match (task.status(), task.result()) {
        (TaskStatus::Succeeded, Some(output)) => {
            info!(task_id = %task.id, "final output produced");
            FinalOutput::Produced {
                task_id: task.id.clone(),
                output: output.to_string(),
            }
        }
        (status, _) => FinalOutput::Unavailable {
            task_id: task.id.clone(),
            status,
        },
    }
}
