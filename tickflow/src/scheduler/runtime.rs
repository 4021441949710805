//! Per-job runtime state: lifecycle status, counters, and next-run
//! computation.
//!
//! Each record carries its own lock. The scheduler loop reads records during
//! its dispatch pass; a worker mutates only the record of the job it is
//! running.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::domain::{JobDefinition, Schedule};

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Eligible for dispatch.
    Active,
    /// Temporarily suspended; `resume` restores active.
    Paused,
    /// Stopped by an operator; `enable` restores active.
    Stopped,
    /// Disabled by an operator or by retry exhaustion.
    Disabled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of applying the retry policy after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Another attempt is scheduled at the given instant.
    Retry {
        at: DateTime<Utc>,
        attempt: u32,
    },
    /// Retries are exhausted; the job is now disabled.
    Exhausted,
}

#[derive(Debug)]
struct RuntimeInner {
    status: JobStatus,
    is_running: bool,
    last_run_time: Option<DateTime<Utc>>,
    next_run_time: Option<DateTime<Utc>>,
    retries_attempted: u32,
    execution_count: u64,
    total_execution_time: Duration,
    last_execution_duration: Option<Duration>,
    last_error: Option<String>,
}

/// Point-in-time view of a job's runtime state.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: String,
    pub schedule_kind: String,
    pub status: JobStatus,
    pub is_running: bool,
    pub last_run_time: Option<DateTime<Utc>>,
    pub next_run_time: Option<DateTime<Utc>>,
    pub retries_attempted: u32,
    pub execution_count: u64,
    pub total_execution_time_secs: f64,
    pub last_execution_duration_secs: Option<f64>,
    pub last_error: Option<String>,
}

/// Mutable runtime state for one job.
pub struct JobState {
    definition: Arc<JobDefinition>,
    inner: Mutex<RuntimeInner>,
}

impl JobState {
    /// Create the initial state.
    ///
    /// Cron and interval jobs start eligible at `now`; a one-off starts at
    /// its scheduled instant; on-demand jobs are never self-scheduled.
    pub fn new(definition: Arc<JobDefinition>, now: DateTime<Utc>) -> Self {
        let status = if definition.enabled {
            JobStatus::Active
        } else {
            JobStatus::Disabled
        };
        let next_run_time = match &definition.schedule {
            Schedule::OnDemand => None,
            Schedule::OneOff(run_at) => Some(*run_at),
            _ => Some(now),
        };

        Self {
            definition,
            inner: Mutex::new(RuntimeInner {
                status,
                is_running: false,
                last_run_time: None,
                next_run_time,
                retries_attempted: 0,
                execution_count: 0,
                total_execution_time: Duration::ZERO,
                last_execution_duration: None,
                last_error: None,
            }),
        }
    }

    pub fn definition(&self) -> &Arc<JobDefinition> {
        &self.definition
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    // Lifecycle transitions.

    /// active → paused.
    pub fn pause(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.status == JobStatus::Active {
            inner.status = JobStatus::Paused;
            true
        } else {
            false
        }
    }

    /// paused → active.
    pub fn resume(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.status == JobStatus::Paused {
            inner.status = JobStatus::Active;
            true
        } else {
            false
        }
    }

    /// any → stopped. In-flight attempts run to completion.
    pub fn stop(&self) {
        self.inner.lock().status = JobStatus::Stopped;
    }

    /// any → disabled.
    pub fn disable(&self) {
        self.inner.lock().status = JobStatus::Disabled;
    }

    /// any → active.
    ///
    /// Enabling does not resurrect scheduling on its own: a retry-exhausted
    /// job keeps `next_run_time = None` until manually triggered.
    pub fn enable(&self) {
        self.inner.lock().status = JobStatus::Active;
    }

    /// Whether the job may be dispatched right now.
    pub fn can_execute(&self) -> bool {
        let inner = self.inner.lock();
        inner.status == JobStatus::Active && !inner.is_running
    }

    pub fn status(&self) -> JobStatus {
        self.inner.lock().status
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().is_running
    }

    pub fn next_run_time(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().next_run_time
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    pub fn execution_count(&self) -> u64 {
        self.inner.lock().execution_count
    }

    pub fn retries_attempted(&self) -> u32 {
        self.inner.lock().retries_attempted
    }

    /// Recompute `next_run_time` from the schedule.
    pub fn schedule_next_run(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.lock();
        inner.next_run_time = compute_next_run(&self.definition.schedule, &inner, now);
    }

    /// Atomically claim the job for one attempt. Fails when the job is not
    /// active or already running, so a job can never be dispatched twice.
    pub(crate) fn begin_dispatch(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.status == JobStatus::Active && !inner.is_running {
            inner.is_running = true;
            true
        } else {
            false
        }
    }

    /// Undo a claim that could not be handed to the executor.
    pub(crate) fn abort_dispatch(&self) {
        self.inner.lock().is_running = false;
    }

    /// Stamp the wall-clock start of an attempt.
    pub(crate) fn mark_started(&self, now: DateTime<Utc>) {
        self.inner.lock().last_run_time = Some(now);
    }

    /// Record a successful attempt: reset the retry counter, clear the last
    /// error, and update execution metrics.
    pub(crate) fn record_success(&self, duration: Duration) {
        let mut inner = self.inner.lock();
        inner.retries_attempted = 0;
        inner.last_error = None;
        inner.execution_count += 1;
        inner.total_execution_time += duration;
        inner.last_execution_duration = Some(duration);
    }

    /// Capture the failure text of an attempt.
    pub(crate) fn record_failure(&self, error: String) {
        self.inner.lock().last_error = Some(error);
    }

    /// Always-run completion step: clear the running flag, refresh
    /// `last_run_time` to the completion instant, and compute the next
    /// scheduled run. Interval cadence is thereby anchored to completion.
    pub(crate) fn finish_attempt(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.lock();
        inner.is_running = false;
        inner.last_run_time = Some(now);
        inner.next_run_time = compute_next_run(&self.definition.schedule, &inner, now);
    }

    /// Apply the retry policy after a failed attempt. This overwrites
    /// whatever `finish_attempt` wrote into `next_run_time`.
    pub(crate) fn apply_retry_policy(&self, now: DateTime<Utc>) -> RetryDecision {
        let mut inner = self.inner.lock();
        inner.retries_attempted += 1;

        if inner.retries_attempted > self.definition.max_retries {
            inner.status = JobStatus::Disabled;
            inner.next_run_time = None;
            RetryDecision::Exhausted
        } else {
            let at = now + delta(self.definition.retry_delay);
            inner.next_run_time = Some(at);
            RetryDecision::Retry {
                at,
                attempt: inner.retries_attempted,
            }
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let inner = self.inner.lock();
        JobSnapshot {
            id: self.definition.id.clone(),
            schedule_kind: self.definition.schedule.kind().to_string(),
            status: inner.status,
            is_running: inner.is_running,
            last_run_time: inner.last_run_time,
            next_run_time: inner.next_run_time,
            retries_attempted: inner.retries_attempted,
            execution_count: inner.execution_count,
            total_execution_time_secs: inner.total_execution_time.as_secs_f64(),
            last_execution_duration_secs: inner.last_execution_duration.map(|d| d.as_secs_f64()),
            last_error: inner.last_error.clone(),
        }
    }
}

fn delta(duration: Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(duration.as_millis() as i64)
}

/// Compute the next run instant for a schedule.
///
/// - cron: the next matching instant strictly after `now` (UTC)
/// - interval: `last_run_time + s` when set, else `now + s`
/// - one_off: the scheduled instant until the first successful completion,
///   nil afterwards
/// - on_demand: nil
fn compute_next_run(
    schedule: &Schedule,
    inner: &RuntimeInner,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::Cron(expr) => expr.after(&now).next(),
        Schedule::Interval(every) => match inner.last_run_time {
            Some(last) => Some(last + delta(*every)),
            None => Some(now + delta(*every)),
        },
        Schedule::OneOff(run_at) => {
            if inner.execution_count > 0 {
                None
            } else {
                Some(*run_at)
            }
        }
        Schedule::OnDemand => None,
    }
}
