//! Scheduler engine — the task registry plus the tick loop that fires due
//! tasks. Due tasks in one pass run sequentially; each task has at most one
//! in-flight run. Job failures are logged, never propagated: nothing on this
//! surface returns an error or panics.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::cron;
use crate::tasks::{ScheduledTask, TaskInfo, TaskSpec};

/// Default seconds between due-task checks.
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;

type Registry = Arc<Mutex<Vec<ScheduledTask>>>;

/// Snapshot of the scheduler's state.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    /// Whether the tick loop is armed.
    pub running: bool,
    pub task_count: usize,
    pub enabled_task_count: usize,
    /// The enabled task with the earliest next run, ties broken arbitrarily.
    pub next_task: Option<TaskInfo>,
}

/// The scheduler — owns the task registry and the tick loop.
///
/// Construct one per process and pass it to whatever registers tasks; there
/// is no global instance.
pub struct Scheduler {
    tasks: Registry,
    ticker: Mutex<Option<JoinHandle<()>>>,
    check_interval: Duration,
}

impl Scheduler {
    /// Create a stopped scheduler with the default 60s check interval.
    pub fn new() -> Self {
        Self::with_check_interval(DEFAULT_CHECK_INTERVAL_SECS)
    }

    /// Create a stopped scheduler checking for due tasks every `secs` seconds.
    pub fn with_check_interval(secs: u64) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(Vec::new())),
            ticker: Mutex::new(None),
            check_interval: Duration::from_secs(secs.max(1)),
        }
    }

    /// Register a task. Re-adding an existing id overwrites the prior entry
    /// wholesale — no merge, no error.
    pub async fn add_task(&self, spec: TaskSpec) {
        let now = Utc::now();
        let task = ScheduledTask {
            next_run_at: cron::next_run(&spec.trigger, now),
            id: spec.id,
            name: spec.name,
            trigger: spec.trigger,
            job: spec.job,
            last_run_at: None,
            is_running: false,
            enabled: spec.enabled,
        };
        tracing::info!(
            "📅 Task registered: '{}' ({}), next run {}",
            task.name,
            task.id,
            task.next_run_at
        );
        let mut tasks = self.tasks.lock().await;
        match tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => tasks.push(task),
        }
    }

    /// Remove a task by id. Returns whether anything was removed.
    pub async fn remove_task(&self, id: &str) -> bool {
        let mut tasks = self.tasks.lock().await;
        let len = tasks.len();
        tasks.retain(|t| t.id != id);
        tasks.len() < len
    }

    /// Enable or disable a task in place. `next_run_at` is left untouched,
    /// so re-enabling resumes the existing schedule instead of firing
    /// immediately. Returns false for an unknown id.
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        let mut tasks = self.tasks.lock().await;
        match tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                task.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Replace a task's trigger and recompute its next run from the current
    /// wall clock. Returns false for an unknown id.
    pub async fn update_trigger(&self, id: &str, trigger: &str) -> bool {
        let mut tasks = self.tasks.lock().await;
        match tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                task.trigger = trigger.to_string();
                task.next_run_at = cron::next_run(trigger, Utc::now());
                true
            }
            None => false,
        }
    }

    /// Snapshot of every registered task. Order is unspecified.
    pub async fn list_tasks(&self) -> Vec<TaskInfo> {
        self.tasks.lock().await.iter().map(|t| t.info()).collect()
    }

    /// Snapshot of one task, if registered.
    pub async fn get_task(&self, id: &str) -> Option<TaskInfo> {
        self.tasks
            .lock()
            .await
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.info())
    }

    /// Current scheduler state.
    pub async fn status(&self) -> SchedulerStatus {
        let running = self.ticker.lock().await.is_some();
        let tasks = self.tasks.lock().await;
        let next_task = tasks
            .iter()
            .filter(|t| t.enabled)
            .min_by_key(|t| t.next_run_at)
            .map(|t| t.info());
        SchedulerStatus {
            running,
            task_count: tasks.len(),
            enabled_task_count: tasks.iter().filter(|t| t.enabled).count(),
            next_task,
        }
    }

    /// Arm the tick loop. The first check runs right away, so tasks already
    /// past due fire without waiting out an interval. Calling `start` while
    /// running is a logged no-op — there is never more than one loop.
    pub async fn start(&self) {
        let mut ticker = self.ticker.lock().await;
        if ticker.is_some() {
            tracing::warn!("⚠️ Scheduler already running, ignoring start()");
            return;
        }
        tracing::info!(
            "⏰ Scheduler started (check every {}s)",
            self.check_interval.as_secs()
        );
        let tasks = Arc::clone(&self.tasks);
        let period = self.check_interval;
        *ticker = Some(tokio::spawn(async move {
            // The first interval tick completes immediately — that is the
            // initial due-task check.
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                run_pass(&tasks).await;
            }
        }));
    }

    /// Disarm the tick loop. A task mid-execution is neither interrupted nor
    /// awaited; it finishes and does its own bookkeeping. Stopping a stopped
    /// scheduler is a logged no-op.
    pub async fn stop(&self) {
        let mut ticker = self.ticker.lock().await;
        match ticker.take() {
            Some(handle) => {
                handle.abort();
                tracing::info!("⏹️ Scheduler stopped");
            }
            None => tracing::warn!("⚠️ Scheduler not running, ignoring stop()"),
        }
    }

    /// Run one due-task pass by hand. The loop calls the same path.
    pub async fn tick(&self) {
        run_pass(&self.tasks).await;
    }

    /// Force a task to run now, bypassing the due-time check but not the
    /// enabled flag or the one-run-per-task gate. Returns whether the task
    /// was actually invoked.
    pub async fn trigger_task(&self, id: &str) -> bool {
        match begin_execution(&self.tasks, id, Utc::now(), true).await {
            Some(execution) => {
                let _ = execution.await;
                true
            }
            None => false,
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// One due-task scan. All due-comparisons share a single "now" so a task
/// cannot become due halfway through the pass.
async fn run_pass(tasks: &Registry) {
    let now = Utc::now();
    let due: Vec<String> = {
        let tasks = tasks.lock().await;
        tasks
            .iter()
            .filter(|t| t.is_due(now))
            .map(|t| t.id.clone())
            .collect()
    };
    for id in due {
        if let Some(execution) = begin_execution(tasks, &id, now, false).await {
            // Awaiting the handle keeps execution sequential within a pass.
            // Aborting the loop abandons this await, not the execution.
            let _ = execution.await;
        }
    }
}

/// Mark a task running and spawn its execution. Returns `None` when the task
/// is unknown, disabled, or already in flight.
async fn begin_execution(
    tasks: &Registry,
    id: &str,
    now: DateTime<Utc>,
    forced: bool,
) -> Option<JoinHandle<()>> {
    let job = {
        let mut tasks = tasks.lock().await;
        let task = tasks.iter_mut().find(|t| t.id == id)?;
        if !task.enabled || task.is_running {
            return None;
        }
        // Recorded before the job runs, so a crash mid-job still leaves an
        // attempt on the books.
        task.is_running = true;
        task.last_run_at = Some(now);
        if forced {
            tracing::info!("🔔 Task force-triggered: '{}'", task.name);
        } else {
            tracing::info!("🔔 Task due: '{}'", task.name);
        }
        Arc::clone(&task.job)
    };

    let tasks = Arc::clone(tasks);
    let id = id.to_string();
    // Own task, so stop() aborting the tick loop never cancels a job.
    Some(tokio::spawn(async move {
        let outcome = std::panic::AssertUnwindSafe(job()).catch_unwind().await;
        match &outcome {
            Ok(Ok(())) => tracing::info!("✅ Task '{id}' completed"),
            Ok(Err(e)) => tracing::warn!("⚠️ Task '{id}' failed: {e}"),
            Err(_) => tracing::warn!("⚠️ Task '{id}' panicked"),
        }
        // Finally: clear the exclusivity flag and schedule the next run from
        // the wall clock after this attempt, so a job slower than its own
        // period cannot fire back-to-back.
        let mut tasks = tasks.lock().await;
        if let Some(task) = tasks.iter_mut().find(|t| t.id == id) {
            task.is_running = false;
            task.next_run_at = cron::next_run(&task.trigger, Utc::now());
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Task whose job bumps a counter and succeeds.
    fn counting_task(id: &str, trigger: &str, counter: Arc<AtomicUsize>) -> TaskSpec {
        TaskSpec::new(id, id, trigger, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        })
    }

    /// Task whose job bumps `started`, then parks until `gate` is notified,
    /// then bumps `finished`.
    fn gated_task(
        id: &str,
        trigger: &str,
        gate: Arc<Notify>,
        started: Arc<AtomicUsize>,
        finished: Arc<AtomicUsize>,
    ) -> TaskSpec {
        TaskSpec::new(id, id, trigger, move || {
            let gate = Arc::clone(&gate);
            let started = Arc::clone(&started);
            let finished = Arc::clone(&finished);
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                gate.notified().await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        })
    }

    /// Let spawned tasks make progress on the single-threaded test runtime.
    async fn drain() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_tick_runs_due_task_and_updates_bookkeeping() {
        let sched = Scheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        // "* * * * *" lands on the current minute, which is at-or-before
        // now, so the task is due on every pass.
        sched
            .add_task(counting_task("t", "* * * * *", Arc::clone(&counter)))
            .await;

        sched.tick().await;
        drain().await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        let info = sched.get_task("t").await.unwrap();
        assert!(info.last_run_at.is_some());
        assert!(!info.is_running);
    }

    #[tokio::test]
    async fn test_future_task_does_not_fire() {
        let sched = Scheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        sched
            .add_task(counting_task("t", "0 2 30 * *", Arc::clone(&counter)))
            .await;

        sched.tick().await;
        drain().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_re_add_overwrites_without_duplicating() {
        let sched = Scheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        sched
            .add_task(counting_task("t", "* * * * *", Arc::clone(&counter)))
            .await;
        sched.tick().await;
        drain().await;
        assert!(sched.get_task("t").await.unwrap().last_run_at.is_some());

        // Same id, fresh spec: the old entry (including its run history) is
        // replaced, not merged.
        let mut replacement = counting_task("t", "0 2 * * *", Arc::clone(&counter));
        replacement.name = "replacement".into();
        sched.add_task(replacement).await;

        assert_eq!(sched.status().await.task_count, 1);
        assert_eq!(sched.list_tasks().await.len(), 1);
        let info = sched.get_task("t").await.unwrap();
        assert_eq!(info.name, "replacement");
        assert_eq!(info.trigger, "0 2 * * *");
        assert!(info.last_run_at.is_none());
    }

    #[tokio::test]
    async fn test_remove_task() {
        let sched = Scheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        sched
            .add_task(counting_task("t", "0 2 * * *", counter))
            .await;
        assert!(sched.remove_task("t").await);
        assert!(!sched.remove_task("t").await);
        assert!(sched.get_task("t").await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_ids_return_false() {
        let sched = Scheduler::new();
        assert!(!sched.set_enabled("ghost", true).await);
        assert!(!sched.update_trigger("ghost", "0 2 * * *").await);
        assert!(!sched.trigger_task("ghost").await);
        assert!(sched.get_task("ghost").await.is_none());
    }

    #[tokio::test]
    async fn test_disabled_task_never_runs_and_keeps_schedule() {
        let sched = Scheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let mut spec = counting_task("t", "* * * * *", Arc::clone(&counter));
        spec.enabled = false;
        sched.add_task(spec).await;

        let scheduled_for = sched.get_task("t").await.unwrap().next_run_at;

        // Overdue, but disabled: neither the tick loop nor a forced trigger
        // may run it.
        sched.tick().await;
        assert!(!sched.trigger_task("t").await);
        drain().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        // Re-enabling resumes the existing schedule rather than resetting it.
        assert!(sched.set_enabled("t", true).await);
        assert_eq!(sched.get_task("t").await.unwrap().next_run_at, scheduled_for);
    }

    #[tokio::test]
    async fn test_failing_job_is_isolated() {
        let sched = Scheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        sched
            .add_task(TaskSpec::new("boom", "boom", "* * * * *", || {
                async { anyhow::bail!("engine rejected the ping") }.boxed()
            }))
            .await;
        sched
            .add_task(counting_task("ok", "* * * * *", Arc::clone(&counter)))
            .await;

        // The failing task must not stop the pass, skip the healthy task, or
        // leave its own bookkeeping dirty.
        sched.tick().await;
        drain().await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        let boom = sched.get_task("boom").await.unwrap();
        assert!(boom.last_run_at.is_some());
        assert!(!boom.is_running);
    }

    #[tokio::test]
    async fn test_panicking_job_is_isolated() {
        let sched = Scheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        sched
            .add_task(TaskSpec::new("panic", "panic", "* * * * *", || {
                async { panic!("job blew up") }.boxed()
            }))
            .await;
        sched
            .add_task(counting_task("ok", "* * * * *", Arc::clone(&counter)))
            .await;

        sched.tick().await;
        drain().await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        let info = sched.get_task("panic").await.unwrap();
        assert!(info.last_run_at.is_some());
        assert!(!info.is_running);
    }

    #[tokio::test]
    async fn test_in_flight_task_is_not_run_twice() {
        let sched = Arc::new(Scheduler::new());
        let gate = Arc::new(Notify::new());
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        sched
            .add_task(gated_task(
                "slow",
                "* * * * *",
                Arc::clone(&gate),
                Arc::clone(&started),
                Arc::clone(&finished),
            ))
            .await;

        let runner = {
            let sched = Arc::clone(&sched);
            tokio::spawn(async move { sched.tick().await })
        };
        drain().await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert!(sched.get_task("slow").await.unwrap().is_running);

        // Due again by the clock, but still in flight: the is_running gate
        // must hold for ticks and for forced triggers alike.
        sched.tick().await;
        sched.tick().await;
        assert!(!sched.trigger_task("slow").await);
        drain().await;
        assert_eq!(started.load(Ordering::SeqCst), 1);

        gate.notify_one();
        runner.await.unwrap();
        drain().await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert!(!sched.get_task("slow").await.unwrap().is_running);
    }

    #[tokio::test]
    async fn test_hung_job_parks_its_task_forever() {
        let sched = Scheduler::new();
        let gate = Arc::new(Notify::new());
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        sched
            .add_task(gated_task(
                "hung",
                "* * * * *",
                gate, // never notified
                Arc::clone(&started),
                Arc::clone(&finished),
            ))
            .await;

        let sched = Arc::new(sched);
        let runner = {
            let sched = Arc::clone(&sched);
            tokio::spawn(async move { sched.tick().await })
        };
        drain().await;
        assert_eq!(started.load(Ordering::SeqCst), 1);

        // No timeout, no watchdog: the task stays parked and never fires
        // again.
        sched.tick().await;
        drain().await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert!(sched.get_task("hung").await.unwrap().is_running);
        runner.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let sched = Scheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        sched
            .add_task(counting_task("t", "* * * * *", Arc::clone(&counter)))
            .await;

        // First start runs the immediate check; the task (due every pass)
        // fires once.
        sched.start().await;
        drain().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // Second start must be a no-op: a second loop would bring its own
        // immediate check and fire the always-due task again.
        sched.start().await;
        drain().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(sched.status().await.running);

        sched.stop().await;
        assert!(!sched.status().await.running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_does_not_interrupt_in_flight_job() {
        let sched = Scheduler::new();
        let gate = Arc::new(Notify::new());
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        sched
            .add_task(gated_task(
                "slow",
                "* * * * *",
                Arc::clone(&gate),
                Arc::clone(&started),
                Arc::clone(&finished),
            ))
            .await;

        sched.start().await;
        drain().await;
        assert_eq!(started.load(Ordering::SeqCst), 1);

        // Stop tears down the loop while the job is parked on the gate. The
        // job must still run to completion and clear its own flag.
        sched.stop().await;
        assert!(!sched.status().await.running);
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        gate.notify_one();
        drain().await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert!(!sched.get_task("slow").await.unwrap().is_running);
    }

    #[tokio::test]
    async fn test_trigger_task_bypasses_due_time() {
        let sched = Scheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        // Next run is nowhere near now; a forced trigger fires anyway.
        sched
            .add_task(counting_task("t", "0 2 30 * *", Arc::clone(&counter)))
            .await;

        assert!(sched.trigger_task("t").await);
        drain().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(sched.get_task("t").await.unwrap().last_run_at.is_some());
    }

    #[tokio::test]
    async fn test_status_reports_earliest_enabled_task() {
        let sched = Scheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        sched
            .add_task(counting_task("daily", "0 2 * * *", Arc::clone(&counter)))
            .await;
        sched
            .add_task(counting_task("soon", "* * * * *", Arc::clone(&counter)))
            .await;

        let status = sched.status().await;
        assert!(!status.running);
        assert_eq!(status.task_count, 2);
        assert_eq!(status.enabled_task_count, 2);
        assert_eq!(status.next_task.unwrap().id, "soon");

        // Disabling the front-runner changes the answer but not its schedule.
        sched.set_enabled("soon", false).await;
        let status = sched.status().await;
        assert_eq!(status.enabled_task_count, 1);
        assert_eq!(status.next_task.unwrap().id, "daily");
    }

    #[tokio::test]
    async fn test_update_trigger_recomputes_next_run() {
        let sched = Scheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        sched
            .add_task(counting_task("t", "0 2 30 * *", counter))
            .await;
        let before = sched.get_task("t").await.unwrap().next_run_at;

        assert!(sched.update_trigger("t", "* * * * *").await);
        let info = sched.get_task("t").await.unwrap();
        assert_eq!(info.trigger, "* * * * *");
        assert!(info.next_run_at < before);
    }
}
