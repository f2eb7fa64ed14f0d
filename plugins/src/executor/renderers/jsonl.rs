use std::io::Write;
use std::sync::Mutex;

use chrono::Local;
use planrun_core::executor::{OutputRendererPlugin, RenderEvent};
use serde_json::{json, Value};
use tracing::warn;

/// Writes every executor event as one JSON object per line.
pub struct JsonlRendererPlugin {
    pretty_print: bool,
    out: Mutex<Box<dyn Write + Send>>,
}

impl JsonlRendererPlugin {
    /// Render to stdout.
    pub fn new(pretty_print: bool) -> Self {
        Self::with_writer(pretty_print, std::io::stdout())
    }

    pub fn with_writer(pretty_print: bool, writer: impl Write + Send + 'static) -> Self {
        Self {
            pretty_print,
            out: Mutex::new(Box::new(writer)),
        }
    }

    fn event_to_json(&self, event: &RenderEvent) -> Value {
        let ts = Local::now().to_rfc3339();
        match event {
            RenderEvent::RunStart {
                run_id,
                goal,
                strategy,
                total_tasks,
                total_levels,
            } => json!({
                "v": 1,
                "event_type": "run.start",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "goal": goal,
                    "strategy": strategy,
                    "total_tasks": total_tasks,
                    "total_levels": total_levels,
                }
            }),
            RenderEvent::Plan { run_id, levels } => {
                let total_tasks: usize = levels.iter().map(|l| l.len()).sum();
                json!({
                    "v": 1,
                    "event_type": "executor.plan",
                    "ts": ts,
                    "run_id": run_id,
                    "metadata": {
                        "levels": levels,
                        "total_tasks": total_tasks,
                    }
                })
            }
            RenderEvent::LevelStart {
                run_id,
                level,
                task_ids,
                concurrency,
            } => json!({
                "v": 1,
                "event_type": "level.start",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "level": level,
                    "tasks": task_ids,
                    "concurrency": concurrency,
                }
            }),
            RenderEvent::TaskStart {
                run_id,
                task_id,
                level,
            } => json!({
                "v": 1,
                "event_type": "task.start",
                "ts": ts,
                "run_id": run_id,
                "task_id": task_id,
                "metadata": {
                    "level": level,
                }
            }),
            RenderEvent::TaskComplete {
                run_id,
                task_id,
                level,
                duration_ms,
                error,
            } => json!({
                "v": 1,
                "event_type": "task.end",
                "ts": ts,
                "run_id": run_id,
                "task_id": task_id,
                "code": error.as_ref().map_or(0, |e| e.error_code().as_u16()),
                "error": error.as_ref().map(|e| e.to_string()),
                "metadata": {
                    "level": level,
                    "duration_ms": duration_ms,
                    "success": error.is_none(),
                }
            }),
            RenderEvent::TaskSkipped {
                run_id,
                task_id,
                level,
                reason,
            } => json!({
                "v": 1,
                "event_type": "task.skipped",
                "ts": ts,
                "run_id": run_id,
                "task_id": task_id,
                "output": reason.to_string(),
                "metadata": {
                    "level": level,
                    "reason": reason,
                }
            }),
            RenderEvent::LevelEnd {
                run_id,
                level,
                succeeded,
                failed,
                skipped,
            } => json!({
                "v": 1,
                "event_type": "level.end",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "level": level,
                    "succeeded": succeeded,
                    "failed": failed,
                    "skipped": skipped,
                }
            }),
            RenderEvent::RunEnd {
                run_id,
                status,
                metrics,
            } => json!({
                "v": 1,
                "event_type": "run.end",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "status": status,
                    "metrics": metrics,
                }
            }),
        }
    }
}

impl OutputRendererPlugin for JsonlRendererPlugin {
    fn name(&self) -> &str {
        "jsonl-renderer"
    }

    fn format(&self) -> &str {
        "jsonl"
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn render(&self, event: &RenderEvent) {
        let value = self.event_to_json(event);
        let line = if self.pretty_print {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        }
        .unwrap_or_else(|_| "{}".into());

        let mut out = match self.out.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
            warn!(error = %e, "failed to write render event");
        }
    }
}
