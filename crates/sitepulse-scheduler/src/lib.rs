//! # SitePulse Scheduler
//!
//! In-process cron-style task scheduler for recurring site jobs.
//! No persistence, no distributed coordination — one process, one loop.
//! Tasks are re-registered by the host on every start.
//!
//! ## Architecture
//! ```text
//! Scheduler (tokio interval, 60s)
//!   ├── registry: id → ScheduledTask (trigger, job fn, next_run_at)
//!   ├── tick: fire due tasks sequentially, one in-flight run per task
//!   └── after each attempt → recompute next_run_at from "now"
//! ```
//!
//! Trigger format: "MIN HOUR DOM MON DOW" — each field `*` or one integer.
//! Anything malformed degrades to a run at the top of the next hour.

pub mod cron;
pub mod engine;
pub mod tasks;

pub use engine::{DEFAULT_CHECK_INTERVAL_SECS, Scheduler, SchedulerStatus};
pub use tasks::{JobFn, JobFuture, TaskInfo, TaskSpec};
