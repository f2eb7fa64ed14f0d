use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::util::time::serialize_duration_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventType {
    TaskStarted,
    TaskCompleted,
    TaskFailed,
    TaskSkipped,
}

impl TimelineEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            TimelineEventType::TaskStarted => "task_started",
            TimelineEventType::TaskCompleted => "task_completed",
            TimelineEventType::TaskFailed => "task_failed",
            TimelineEventType::TaskSkipped => "task_skipped",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, TimelineEventType::TaskStarted)
    }
}

impl std::fmt::Display for TimelineEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEvent {
    /// Position in the timeline; strictly increasing.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: TimelineEventType,
    pub task_id: String,
    pub description: String,
    #[serde(rename = "duration_ms", serialize_with = "serialize_duration_ms")]
    pub duration: Duration,
}

/// Append-only event log shared by the tasks of one run.
///
/// The sequence number and timestamp are taken under the same lock as the
/// append, so timeline order, `seq` order and timestamp order agree.
#[derive(Debug, Default)]
pub struct TimelineRecorder {
    events: Mutex<Vec<TimelineEvent>>,
}

impl TimelineRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event stamped with the current time and return a copy.
    pub fn record(
        &self,
        event_type: TimelineEventType,
        task_id: &str,
        description: impl Into<String>,
        duration: Duration,
    ) -> TimelineEvent {
        let mut events = match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let event = TimelineEvent {
            seq: events.len() as u64,
            timestamp: Utc::now(),
            event_type,
            task_id: task_id.to_string(),
            description: description.into(),
            duration,
        };
        events.push(event.clone());
        event
    }

    pub fn len(&self) -> usize {
        match self.events.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<TimelineEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn into_events(self) -> Vec<TimelineEvent> {
        match self.events.into_inner() {
            Ok(events) => events,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
