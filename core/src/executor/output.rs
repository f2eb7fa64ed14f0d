use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{SkipReason, TaskError};
use crate::plan::Strategy;

use super::traits::{OutputRendererPlugin, RenderEvent};
use super::types::{Metrics, RunStatus};

/// Routes run events to the installed renderer, or to `tracing` when there
/// is none.
#[derive(Clone)]
pub(crate) struct Emitter {
    run_id: String,
    renderer: Option<Arc<dyn OutputRendererPlugin>>,
}

impl Emitter {
    pub(crate) fn new(run_id: String, renderer: Option<Arc<dyn OutputRendererPlugin>>) -> Self {
        Self { run_id, renderer }
    }

    pub(crate) fn run_id(&self) -> &str {
        &self.run_id
    }

    pub(crate) fn emit_run_start(
        &self,
        goal: &str,
        strategy: Strategy,
        total_tasks: usize,
        total_levels: usize,
    ) {
        self.emit(RenderEvent::RunStart {
            run_id: self.run_id.clone(),
            goal: goal.to_string(),
            strategy,
            total_tasks,
            total_levels,
        });
    }

    pub(crate) fn emit_plan(&self, levels: &[Vec<String>]) {
        self.emit(RenderEvent::Plan {
            run_id: self.run_id.clone(),
            levels: levels.to_vec(),
        });
    }

    pub(crate) fn emit_level_start(&self, level: usize, task_ids: Vec<String>, concurrency: usize) {
        self.emit(RenderEvent::LevelStart {
            run_id: self.run_id.clone(),
            level,
            task_ids,
            concurrency,
        });
    }

    pub(crate) fn emit_task_start(&self, task_id: &str, level: usize) {
        self.emit(RenderEvent::TaskStart {
            run_id: self.run_id.clone(),
            task_id: task_id.to_string(),
            level,
        });
    }

    pub(crate) fn emit_task_complete(
        &self,
        task_id: &str,
        level: usize,
        duration_ms: u64,
        error: Option<TaskError>,
    ) {
        self.emit(RenderEvent::TaskComplete {
            run_id: self.run_id.clone(),
            task_id: task_id.to_string(),
            level,
            duration_ms,
            error,
        });
    }

    pub(crate) fn emit_task_skipped(&self, task_id: &str, level: usize, reason: SkipReason) {
        self.emit(RenderEvent::TaskSkipped {
            run_id: self.run_id.clone(),
            task_id: task_id.to_string(),
            level,
            reason,
        });
    }

    pub(crate) fn emit_level_end(
        &self,
        level: usize,
        succeeded: usize,
        failed: usize,
        skipped: usize,
    ) {
        self.emit(RenderEvent::LevelEnd {
            run_id: self.run_id.clone(),
            level,
            succeeded,
            failed,
            skipped,
        });
    }

    pub(crate) fn emit_run_end(&self, status: RunStatus, metrics: &Metrics) {
        self.emit(RenderEvent::RunEnd {
            run_id: self.run_id.clone(),
            status,
            metrics: metrics.clone(),
        });
    }

    fn emit(&self, event: RenderEvent) {
        match &self.renderer {
            Some(renderer) => renderer.render(&event),
            None => trace_event(&event),
        }
    }
}

fn trace_event(event: &RenderEvent) {
    match event {
        RenderEvent::RunStart {
            run_id,
            goal,
            strategy,
            total_tasks,
            total_levels,
        } => info!(
            run_id = %run_id,
            %strategy,
            total_tasks,
            total_levels,
            "starting run: {goal}"
        ),
        RenderEvent::Plan { run_id, levels } => {
            for (level, ids) in levels.iter().enumerate() {
                debug!(run_id = %run_id, level, tasks = %ids.join(", "), "planned level");
            }
        }
        RenderEvent::LevelStart {
            run_id,
            level,
            task_ids,
            concurrency,
        } => info!(
            run_id = %run_id,
            level,
            runnable = task_ids.len(),
            concurrency,
            "level start"
        ),
        RenderEvent::TaskStart {
            run_id,
            task_id,
            level,
        } => debug!(run_id = %run_id, task_id = %task_id, level, "task start"),
        RenderEvent::TaskComplete {
            run_id,
            task_id,
            level,
            duration_ms,
            error: None,
        } => debug!(
            run_id = %run_id,
            task_id = %task_id,
            level,
            duration_ms,
            "task succeeded"
        ),
        RenderEvent::TaskComplete {
            run_id,
            task_id,
            level,
            duration_ms,
            error: Some(err),
        } => warn!(
            run_id = %run_id,
            task_id = %task_id,
            level,
            duration_ms,
            error = %err,
            "task failed"
        ),
        RenderEvent::TaskSkipped {
            run_id,
            task_id,
            level,
            reason,
        } => warn!(run_id = %run_id, task_id = %task_id, level, "task skipped: {reason}"),
        RenderEvent::LevelEnd {
            run_id,
            level,
            succeeded,
            failed,
            skipped,
        } => info!(run_id = %run_id, level, succeeded, failed, skipped, "level end"),
        RenderEvent::RunEnd {
            run_id,
            status,
            metrics,
        } => info!(
            run_id = %run_id,
            ?status,
            succeeded = metrics.succeeded_count,
            failed = metrics.failed_count,
            skipped = metrics.skipped_count,
            total_ms = crate::util::time::millis(metrics.total_duration),
            "run finished"
        ),
    }
}
