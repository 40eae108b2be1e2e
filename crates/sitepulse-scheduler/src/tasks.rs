//! Task definitions — the data model for scheduled work.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;

/// Future returned by a job function.
pub type JobFuture = BoxFuture<'static, anyhow::Result<()>>;

/// An opaque asynchronous unit of work. Failure is signaled by `Err`; the
/// scheduler never inspects anything else about it.
pub type JobFn = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// Registration input for [`crate::Scheduler::add_task`].
#[derive(Clone)]
pub struct TaskSpec {
    /// Unique task ID — the registry key. Re-adding an ID overwrites.
    pub id: String,
    /// Human-readable name, not used for identity.
    pub name: String,
    /// 5-field cron-style trigger: "MIN HOUR DOM MON DOW".
    pub trigger: String,
    /// The work to run when the task fires.
    pub job: JobFn,
    /// Disabled tasks are never executed, not even by a forced trigger.
    pub enabled: bool,
}

impl TaskSpec {
    /// Create an enabled task spec.
    pub fn new<F>(id: &str, name: &str, trigger: &str, job: F) -> Self
    where
        F: Fn() -> JobFuture + Send + Sync + 'static,
    {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            trigger: trigger.to_string(),
            job: Arc::new(job),
            enabled: true,
        }
    }
}

/// A registered task — the live registry entry.
pub(crate) struct ScheduledTask {
    pub id: String,
    pub name: String,
    pub trigger: String,
    pub job: JobFn,
    /// Start of the most recent execution attempt.
    pub last_run_at: Option<DateTime<Utc>>,
    /// Always present once registered; recomputed after every attempt.
    pub next_run_at: DateTime<Utc>,
    /// Execution-exclusivity flag: true only while one run is in flight.
    pub is_running: bool,
    pub enabled: bool,
}

impl ScheduledTask {
    /// Whether this task should be executed at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && !self.is_running && now >= self.next_run_at
    }

    /// By-value snapshot for the introspection surface.
    pub fn info(&self) -> TaskInfo {
        TaskInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            trigger: self.trigger.clone(),
            last_run_at: self.last_run_at,
            next_run_at: self.next_run_at,
            is_running: self.is_running,
            enabled: self.enabled,
        }
    }
}

/// Snapshot of a task for callers. Excludes the job function.
#[derive(Debug, Clone, Serialize)]
pub struct TaskInfo {
    pub id: String,
    pub name: String,
    pub trigger: String,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: DateTime<Utc>,
    pub is_running: bool,
    pub enabled: bool,
}
