#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use planrun_core::error::StepError;
use planrun_core::executor::{DependencyResult, StepInput, StepRunner};
use planrun_core::plan::{Plan, TaskType};

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness (`RUST_LOG` controls it).
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A runner whose behaviour per task is scripted up front.
///
/// Tasks named in `failing` return `StepError::Failed`; every task sleeps for
/// its configured delay (or the default one). The runner records the peak
/// number of simultaneous calls and the inputs it received.
#[derive(Default)]
pub struct ScriptedRunner {
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    cooperative: bool,
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<Vec<StepInput>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn delay(mut self, id: &str, delay: Duration) -> Self {
        self.delays.insert(id.to_string(), delay);
        self
    }

    pub fn default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Stop early (with `StepError::Cancelled`) when the token fires.
    pub fn cooperative(mut self) -> Self {
        self.cooperative = true;
        self
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn call_order(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|input| input.task_id.clone())
            .collect()
    }

    pub fn input_for(&self, id: &str) -> Option<StepInput> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|input| input.task_id == id)
            .cloned()
    }
}

#[async_trait]
impl StepRunner for ScriptedRunner {
    async fn run(&self, input: StepInput) -> Result<String, StepError> {
        self.calls.lock().unwrap().push(input.clone());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let delay = self
            .delays
            .get(&input.task_id)
            .copied()
            .unwrap_or(self.default_delay);

        let interrupted = if self.cooperative {
            tokio::select! {
                _ = tokio::time::sleep(delay) => false,
                _ = input.cancel.cancelled() => true,
            }
        } else {
            tokio::time::sleep(delay).await;
            false
        };

        self.active.fetch_sub(1, Ordering::SeqCst);

        if interrupted {
            return Err(StepError::Cancelled);
        }
        if self.failing.contains(&input.task_id) {
            return Err(StepError::Failed(format!("{} exploded", input.task_id)));
        }
        Ok(render_output(&input.task_id, &input.dependency_results))
    }
}

fn render_output(task_id: &str, deps: &[DependencyResult]) -> String {
    if deps.is_empty() {
        format!("out:{task_id}")
    } else {
        let inputs: Vec<&str> = deps.iter().map(|d| d.output.as_str()).collect();
        format!("out:{task_id}[{}]", inputs.join("+"))
    }
}

/// A -> {B, C} -> D, with D an aggregate.
pub fn diamond() -> Plan {
    let mut plan = Plan::new("diamond");
    plan.add("A", "fetch", TaskType::Action, Vec::<String>::new())
        .unwrap()
        .add("B", "left", TaskType::Action, ["A"])
        .unwrap()
        .add("C", "right", TaskType::Observation, ["A"])
        .unwrap()
        .add("D", "combine", TaskType::Aggregate, ["B", "C"])
        .unwrap();
    plan
}

/// `n` independent tasks named `t0..t{n-1}`.
pub fn fan_out(goal: &str, n: usize) -> Plan {
    let mut plan = Plan::new(goal);
    for i in 0..n {
        plan.add(format!("t{i}"), format!("task {i}"), TaskType::Action, Vec::<String>::new())
            .unwrap();
    }
    plan
}
