//! Worker pool: runs one job attempt to completion under bounded
//! concurrency.
//!
//! An attempt resolves its target, pulls a batch when the job is
//! input-triggered, invokes the target under the attempt timeout, then
//! settles the batch (ack on success, nack-requeue on failure). The retry
//! policy is applied strictly after the completion bookkeeping, so its
//! `next_run_time` write wins.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::runtime::{JobState, RetryDecision};
use crate::domain::{JobDefinition, Trigger};
use crate::inputs::{InputItem, InputManager};
use crate::registry::{JobContext, JobFn, Registry};
use crate::{Error, Result};

/// Default worker pool size.
pub const DEFAULT_NUM_WORKERS: usize = 5;

/// Bounded pool of concurrent job attempts.
pub struct Executor {
    registry: Arc<Registry>,
    semaphore: Arc<Semaphore>,
    num_workers: usize,
    tasks: Mutex<Option<JoinSet<()>>>,
}

impl Executor {
    pub fn new(registry: Arc<Registry>, num_workers: usize) -> Self {
        let num_workers = num_workers.max(1);
        Self {
            registry,
            semaphore: Arc::new(Semaphore::new(num_workers)),
            num_workers,
            tasks: Mutex::new(Some(JoinSet::new())),
        }
    }

    /// Hand one claimed job to the pool. The attempt waits for a worker slot
    /// without blocking the caller.
    pub fn submit(&self, state: Arc<JobState>, input_manager: Arc<InputManager>) {
        let mut tasks = self.tasks.lock();
        let Some(join_set) = tasks.as_mut() else {
            warn!(job = state.id(), "Executor is shut down; dropping dispatch");
            state.abort_dispatch();
            return;
        };

        // Reap attempts that already finished.
        while join_set.try_join_next().is_some() {}

        let semaphore = self.semaphore.clone();
        let registry = self.registry.clone();
        join_set.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                state.abort_dispatch();
                return;
            };
            run_attempt(state, registry, input_manager).await;
        });
    }

    /// Number of attempts currently holding a worker slot.
    pub fn active_count(&self) -> usize {
        self.num_workers - self.semaphore.available_permits()
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Stop accepting work and wait for in-flight attempts to complete.
    pub async fn shutdown(&self) {
        let join_set = { self.tasks.lock().take() };
        if let Some(mut join_set) = join_set {
            while join_set.join_next().await.is_some() {}
        }
    }
}

/// One full attempt: execute, record the outcome, run the completion step,
/// then apply the retry policy on failure.
async fn run_attempt(state: Arc<JobState>, registry: Arc<Registry>, inputs: Arc<InputManager>) {
    let job = state.definition().clone();
    state.mark_started(Utc::now());
    let started = Instant::now();

    let result = execute(&job, &registry, &inputs).await;
    let elapsed = started.elapsed();

    match &result {
        Ok(()) => {
            state.record_success(elapsed);
            info!(job = %job.id, duration_ms = elapsed.as_millis() as u64, "Job executed");
        }
        Err(e) => {
            state.record_failure(e.to_string());
            error!(job = %job.id, "Job attempt failed: {e}");
        }
    }

    // Completion step runs unconditionally; the retry policy below may
    // overwrite the next run it computed.
    state.finish_attempt(Utc::now());

    if result.is_err() {
        match state.apply_retry_policy(Utc::now()) {
            RetryDecision::Retry { at, attempt } => {
                warn!(
                    job = %job.id,
                    attempt,
                    max_retries = job.max_retries,
                    retry_at = %at,
                    "Retry scheduled"
                );
            }
            RetryDecision::Exhausted => {
                error!(job = %job.id, "Job exceeded max retries, disabling");
            }
        }
    }
}

async fn execute(job: &JobDefinition, registry: &Registry, inputs: &InputManager) -> Result<()> {
    let target = registry.resolve(&job.module, &job.function)?;

    match &job.trigger {
        Some(Trigger::Input { input_id }) => {
            let batch = inputs.poll_batch(input_id, job.batch_size).await;
            debug!(job = %job.id, input = %input_id, batch_len = batch.len(), "Polled batch");

            match invoke(&target, job, batch.clone()).await {
                Ok(()) => {
                    inputs.ack_batch(input_id, &batch).await;
                    Ok(())
                }
                Err(e) => {
                    inputs.nack_batch(input_id, &batch, true).await;
                    Err(e)
                }
            }
        }
        None => invoke(&target, job, Vec::new()).await,
    }
}

async fn invoke(target: &JobFn, job: &JobDefinition, batch: Vec<InputItem>) -> Result<()> {
    let ctx = JobContext {
        batch,
        args: job.args.clone(),
        kwargs: job.kwargs.clone(),
    };

    match tokio::time::timeout(job.timeout, target(ctx)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            seconds: job.timeout.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Schedule;
    use crate::scheduler::runtime::JobStatus;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.register("test.ok", |_ctx| async { Ok(()) });
        registry.register("test.fail", |_ctx| async { Err(Error::execution("boom")) });
        registry
    }

    fn dispatched_state(definition: JobDefinition) -> Arc<JobState> {
        let state = Arc::new(JobState::new(Arc::new(definition), Utc::now()));
        assert!(state.begin_dispatch());
        state
    }

    fn empty_inputs() -> Arc<InputManager> {
        Arc::new(InputManager::new(&[]).unwrap())
    }

    #[tokio::test]
    async fn test_successful_attempt_updates_metrics() {
        let executor = Executor::new(Arc::new(registry()), 2);
        let state = dispatched_state(JobDefinition::new(
            "ok",
            "test",
            "ok",
            Schedule::interval_secs(60),
        ));

        executor.submit(state.clone(), empty_inputs());
        executor.shutdown().await;

        assert_eq!(state.execution_count(), 1);
        assert!(!state.is_running());
        assert!(state.last_error().is_none());
        assert!(state.next_run_time().is_some());
    }

    #[tokio::test]
    async fn test_failed_attempt_schedules_retry() {
        let executor = Executor::new(Arc::new(registry()), 2);
        let state = dispatched_state(
            JobDefinition::new("bad", "test", "fail", Schedule::interval_secs(60))
                .with_retry_policy(3, Duration::from_secs(5)),
        );

        let before = Utc::now();
        executor.submit(state.clone(), empty_inputs());
        executor.shutdown().await;

        assert_eq!(state.retries_attempted(), 1);
        assert!(state.last_error().is_some());
        // The retry write must win over the completion step's interval write.
        let next = state.next_run_time().unwrap();
        assert!(next >= before + chrono::Duration::seconds(5));
    }

    #[tokio::test]
    async fn test_resolution_failure_counts_as_job_failure() {
        let executor = Executor::new(Arc::new(registry()), 2);
        let state = dispatched_state(JobDefinition::new(
            "ghost",
            "missing",
            "target",
            Schedule::interval_secs(60),
        ));

        executor.submit(state.clone(), empty_inputs());
        executor.shutdown().await;

        assert_eq!(state.retries_attempted(), 1);
        assert!(state.last_error().unwrap().contains("missing.target"));
    }

    #[tokio::test]
    async fn test_attempt_timeout_is_a_failure() {
        let mut registry = Registry::new();
        registry.register("test.slow", |_ctx| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        });
        let executor = Executor::new(Arc::new(registry), 2);
        let state = dispatched_state(
            JobDefinition::new("slow", "test", "slow", Schedule::interval_secs(60))
                .with_timeout(Duration::from_millis(50)),
        );

        executor.submit(state.clone(), empty_inputs());
        executor.shutdown().await;

        assert_eq!(state.retries_attempted(), 1);
        assert!(state.last_error().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let running = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));

        let mut registry = Registry::new();
        {
            let running = running.clone();
            let peak = peak.clone();
            registry.register("test.busy", move |_ctx| {
                let running = running.clone();
                let peak = peak.clone();
                async move {
                    let current = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(current, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            });
        }

        let executor = Executor::new(Arc::new(registry), 2);
        let inputs = empty_inputs();
        for i in 0..6 {
            let state = dispatched_state(JobDefinition::new(
                format!("busy-{i}"),
                "test",
                "busy",
                Schedule::interval_secs(60),
            ));
            executor.submit(state, inputs.clone());
        }
        executor.shutdown().await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_input_triggered_attempt_consumes_batch() {
        let inputs = Arc::new(
            InputManager::new(&[crate::domain::InputDefinition::list(
                "orders",
                vec![serde_json::json!("a"), serde_json::json!("b")],
            )])
            .unwrap(),
        );

        let seen = Arc::new(AtomicU32::new(0));
        let mut registry = Registry::new();
        {
            let seen = seen.clone();
            registry.register("test.consume", move |ctx: JobContext| {
                let seen = seen.clone();
                async move {
                    seen.fetch_add(ctx.batch.len() as u32, Ordering::SeqCst);
                    Ok(())
                }
            });
        }

        let executor = Executor::new(Arc::new(registry), 2);
        let state = dispatched_state(
            JobDefinition::new("consumer", "test", "consume", Schedule::interval_secs(60))
                .with_input_trigger("orders")
                .with_batch_size(10),
        );

        executor.submit(state.clone(), inputs.clone());
        executor.shutdown().await;

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert!(!inputs.has_data("orders").await);
        assert_eq!(state.execution_count(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_disables_job() {
        let executor = Executor::new(Arc::new(registry()), 1);
        let state = Arc::new(JobState::new(
            Arc::new(
                JobDefinition::new("bad", "test", "fail", Schedule::interval_secs(60))
                    .with_retry_policy(1, Duration::from_millis(1)),
            ),
            Utc::now(),
        ));
        let inputs = empty_inputs();

        for _ in 0..2 {
            assert!(state.begin_dispatch());
            executor.submit(state.clone(), inputs.clone());
            // Wait for the attempt to settle before re-claiming.
            while state.is_running() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
        executor.shutdown().await;

        assert_eq!(state.status(), JobStatus::Disabled);
        assert!(state.next_run_time().is_none());
        assert_eq!(state.retries_attempted(), 2);
    }
}
