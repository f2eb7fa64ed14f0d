use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::TaskError;
use crate::plan::TaskStatus;
use crate::util::time::millis;

use super::metrics::MetricsCollector;
use super::output::Emitter;
use super::timeline::{TimelineEventType, TimelineRecorder};
use super::traits::{StepInput, StepRunner};

/// Shared, read-only state for dispatching the tasks of one level.
pub(crate) struct LevelContext<'a> {
    pub level: usize,
    pub runner: &'a dyn StepRunner,
    pub timeline: &'a TimelineRecorder,
    pub metrics: &'a MetricsCollector,
    pub emitter: &'a Emitter,
    pub cancel: &'a CancellationToken,
    pub cancel_grace: Duration,
}

/// One runnable task, ready to hand to the runner.
pub(crate) struct Dispatch {
    pub idx: usize,
    pub input: StepInput,
    pub timeout: Option<Duration>,
}

/// A task that was admitted and ran to completion (successfully or not).
pub(crate) struct Finished {
    pub idx: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: Result<String, TaskError>,
}

/// A task that was admitted but was still running when the cancellation
/// grace period ran out.
pub(crate) struct Abandoned {
    pub idx: usize,
    pub started_at: DateTime<Utc>,
}

#[derive(Default)]
pub(crate) struct LevelOutcome {
    /// In completion order.
    pub finished: Vec<Finished>,
    /// In declaration order.
    pub abandoned: Vec<Abandoned>,
    /// Never admitted because the run was cancelled; declaration order.
    pub not_admitted: Vec<usize>,
}

impl LevelOutcome {
    pub fn dispatched(&self) -> usize {
        self.finished.len() + self.abandoned.len()
    }

    pub fn failed(&self) -> usize {
        self.finished.iter().filter(|f| f.outcome.is_err()).count()
    }
}

/// Execute a single level with at most `limit` tasks running at once.
///
/// Tasks are admitted in the order given. Returns once every admitted task
/// has finished, or once the cancellation grace period has expired, in
/// which case the remaining futures are dropped.
pub(crate) async fn run_level(
    ctx: &LevelContext<'_>,
    dispatches: Vec<Dispatch>,
    limit: usize,
) -> LevelOutcome {
    let gate = Arc::new(Semaphore::new(limit.max(1)));
    let mut queue: VecDeque<Dispatch> = dispatches.into();
    let mut in_flight = FuturesUnordered::new();
    let mut running: BTreeMap<usize, DateTime<Utc>> = BTreeMap::new();
    let mut outcome = LevelOutcome::default();
    let mut grace_deadline: Option<Instant> = None;

    loop {
        if grace_deadline.is_none() && !ctx.cancel.is_cancelled() {
            while !queue.is_empty() {
                let Ok(permit) = Arc::clone(&gate).try_acquire_owned() else {
                    break;
                };
                let Some(dispatch) = queue.pop_front() else {
                    break;
                };
                let started_at = admit(ctx, &dispatch);
                running.insert(dispatch.idx, started_at);
                in_flight.push(run_task(ctx, dispatch, started_at, permit));
            }
        }

        if in_flight.is_empty() {
            break;
        }

        tokio::select! {
            biased;

            Some(finished) = in_flight.next() => {
                running.remove(&finished.idx);
                outcome.finished.push(finished);
            }
            _ = ctx.cancel.cancelled(), if grace_deadline.is_none() => {
                warn!(
                    level = ctx.level,
                    running = running.len(),
                    grace_ms = millis(ctx.cancel_grace),
                    "cancellation requested, waiting for running tasks"
                );
                grace_deadline = Some(Instant::now() + ctx.cancel_grace);
            }
            _ = wait_until(grace_deadline) => {
                warn!(
                    level = ctx.level,
                    abandoned = running.len(),
                    "cancellation grace period expired"
                );
                break;
            }
        }
    }

    drop(in_flight);

    outcome.abandoned = running
        .into_iter()
        .map(|(idx, started_at)| Abandoned { idx, started_at })
        .collect();
    outcome.not_admitted = queue.into_iter().map(|d| d.idx).collect();
    outcome
}

/// Record the start of a task and return its start timestamp.
fn admit(ctx: &LevelContext<'_>, dispatch: &Dispatch) -> DateTime<Utc> {
    debug!(level = ctx.level, task_id = %dispatch.input.task_id, "dispatching task");
    let event = ctx.timeline.record(
        TimelineEventType::TaskStarted,
        &dispatch.input.task_id,
        dispatch.input.description.clone(),
        Duration::ZERO,
    );
    ctx.emitter.emit_task_start(&dispatch.input.task_id, ctx.level);
    event.timestamp
}

async fn run_task(
    ctx: &LevelContext<'_>,
    dispatch: Dispatch,
    started_at: DateTime<Utc>,
    permit: OwnedSemaphorePermit,
) -> Finished {
    let _permit = permit;
    let Dispatch {
        idx,
        input,
        timeout,
    } = dispatch;
    let task_id = input.task_id.clone();
    let description = input.description.clone();

    let clock = Instant::now();
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, ctx.runner.run(input)).await {
            Ok(res) => res.map_err(TaskError::from),
            Err(_) => Err(TaskError::Timeout {
                timeout_ms: millis(limit),
            }),
        },
        None => ctx.runner.run(input).await.map_err(TaskError::from),
    };
    let duration = clock.elapsed();

    let (event_type, status, event_description) = match &outcome {
        Ok(_) => (
            TimelineEventType::TaskCompleted,
            TaskStatus::Succeeded,
            description,
        ),
        Err(err) => (
            TimelineEventType::TaskFailed,
            TaskStatus::Failed,
            err.to_string(),
        ),
    };
    let event = ctx
        .timeline
        .record(event_type, &task_id, event_description, duration);
    ctx.metrics.record(status, duration);
    ctx.emitter.emit_task_complete(
        &task_id,
        ctx.level,
        millis(duration),
        outcome.as_ref().err().cloned(),
    );

    Finished {
        idx,
        started_at,
        finished_at: event.timestamp,
        outcome,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepError;
    use crate::plan::TaskType;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SleepyRunner {
        delay: Duration,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SleepyRunner {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl StepRunner for SleepyRunner {
        async fn run(&self, input: StepInput) -> Result<String, StepError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            if input.description == "fail" {
                return Err(StepError::Failed("boom".into()));
            }
            Ok(format!("{} done", input.task_id))
        }
    }

    fn dispatch(idx: usize, description: &str, cancel: &CancellationToken) -> Dispatch {
        Dispatch {
            idx,
            input: StepInput {
                task_id: format!("t{idx}"),
                description: description.to_string(),
                task_type: TaskType::Action,
                dependency_results: Vec::new(),
                cancel: cancel.child_token(),
            },
            timeout: None,
        }
    }

    struct Fixture {
        timeline: TimelineRecorder,
        metrics: MetricsCollector,
        emitter: Emitter,
        cancel: CancellationToken,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                timeline: TimelineRecorder::new(),
                metrics: MetricsCollector::new(),
                emitter: Emitter::new("test-run".into(), None),
                cancel: CancellationToken::new(),
            }
        }

        fn context<'a>(&'a self, runner: &'a dyn StepRunner) -> LevelContext<'a> {
            LevelContext {
                level: 0,
                runner,
                timeline: &self.timeline,
                metrics: &self.metrics,
                emitter: &self.emitter,
                cancel: &self.cancel,
                cancel_grace: Duration::from_millis(20),
            }
        }
    }

    #[tokio::test]
    async fn test_limit_bounds_running_tasks() {
        let fx = Fixture::new();
        let runner = SleepyRunner::new(Duration::from_millis(15));
        let ctx = fx.context(&runner);
        let work = (0..7).map(|i| dispatch(i, "ok", &fx.cancel)).collect();

        let outcome = run_level(&ctx, work, 3).await;

        assert_eq!(outcome.finished.len(), 7);
        assert_eq!(outcome.failed(), 0);
        assert_eq!(runner.peak.load(Ordering::SeqCst), 3);
        assert_eq!(fx.metrics.recorded(), 7);
    }

    #[tokio::test]
    async fn test_admission_follows_declaration_order() {
        let fx = Fixture::new();
        let runner = SleepyRunner::new(Duration::from_millis(2));
        let ctx = fx.context(&runner);
        let work = (0..5).map(|i| dispatch(i, "ok", &fx.cancel)).collect();

        run_level(&ctx, work, 1).await;

        let started: Vec<String> = fx
            .timeline
            .snapshot()
            .into_iter()
            .filter(|e| e.event_type == TimelineEventType::TaskStarted)
            .map(|e| e.task_id)
            .collect();
        assert_eq!(started, vec!["t0", "t1", "t2", "t3", "t4"]);
    }

    #[tokio::test]
    async fn test_failures_are_captured_per_task() {
        let fx = Fixture::new();
        let runner = SleepyRunner::new(Duration::from_millis(1));
        let ctx = fx.context(&runner);
        let work = vec![dispatch(0, "ok", &fx.cancel), dispatch(1, "fail", &fx.cancel)];

        let outcome = run_level(&ctx, work, 2).await;

        assert_eq!(outcome.dispatched(), 2);
        assert_eq!(outcome.failed(), 1);
        let failed = outcome.finished.iter().find(|f| f.idx == 1).unwrap();
        assert_eq!(
            failed.outcome,
            Err(TaskError::RunnerFailure {
                message: "boom".into()
            })
        );
        assert!(failed.started_at <= failed.finished_at);
    }

    #[tokio::test]
    async fn test_timeout_becomes_task_error() {
        let fx = Fixture::new();
        let runner = SleepyRunner::new(Duration::from_millis(500));
        let ctx = fx.context(&runner);
        let mut slow = dispatch(0, "ok", &fx.cancel);
        slow.timeout = Some(Duration::from_millis(10));

        let outcome = run_level(&ctx, vec![slow], 1).await;

        assert_eq!(
            outcome.finished[0].outcome,
            Err(TaskError::Timeout { timeout_ms: 10 })
        );
    }

    #[tokio::test]
    async fn test_cancel_abandons_after_grace() {
        let fx = Fixture::new();
        let runner = SleepyRunner::new(Duration::from_secs(5));
        let ctx = fx.context(&runner);
        let work = (0..4).map(|i| dispatch(i, "ok", &fx.cancel)).collect();

        let cancel = fx.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        });

        let outcome = run_level(&ctx, work, 2).await;

        assert!(outcome.finished.is_empty());
        let abandoned: Vec<usize> = outcome.abandoned.iter().map(|a| a.idx).collect();
        assert_eq!(abandoned, vec![0, 1]);
        assert_eq!(outcome.not_admitted, vec![2, 3]);
    }
}
