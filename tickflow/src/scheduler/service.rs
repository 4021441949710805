//! Scheduler service: the tick loop and runtime control operations.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::executor::{DEFAULT_NUM_WORKERS, Executor};
use super::runtime::{JobSnapshot, JobState};
use crate::domain::{InputDefinition, JobDefinition, Trigger};
use crate::inputs::InputManager;
use crate::registry::Registry;
use crate::{Error, Result};

/// Default tick cadence.
const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Pause between dispatch passes.
    pub tick: Duration,
    /// Worker pool size.
    pub num_workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            num_workers: DEFAULT_NUM_WORKERS,
        }
    }
}

/// The scheduler owns every job's runtime state and the input manager, and
/// drives dispatch from a single cooperative loop.
///
/// Control operations and the dispatch pass are serialized under one async
/// lock; workers only touch the record of the job they run.
pub struct Scheduler {
    config: SchedulerConfig,
    states: HashMap<String, Arc<JobState>>,
    input_manager: Arc<InputManager>,
    executor: Executor,
    control_lock: tokio::sync::Mutex<()>,
    cancellation_token: CancellationToken,
}

impl Scheduler {
    /// Create a scheduler with default configuration.
    pub fn new(
        jobs: Vec<JobDefinition>,
        inputs: Vec<InputDefinition>,
        registry: Registry,
    ) -> Result<Self> {
        Self::with_config(jobs, inputs, registry, SchedulerConfig::default())
    }

    /// Create a scheduler with custom configuration.
    pub fn with_config(
        jobs: Vec<JobDefinition>,
        inputs: Vec<InputDefinition>,
        registry: Registry,
        config: SchedulerConfig,
    ) -> Result<Self> {
        Self::with_full_config(jobs, inputs, registry, config, CancellationToken::new())
    }

    /// Create a scheduler with custom configuration and a shared cancellation
    /// token, so a parent can cancel it directly.
    pub fn with_full_config(
        jobs: Vec<JobDefinition>,
        inputs: Vec<InputDefinition>,
        registry: Registry,
        config: SchedulerConfig,
        cancellation_token: CancellationToken,
    ) -> Result<Self> {
        let input_manager = Arc::new(InputManager::new(&inputs)?);

        let now = Utc::now();
        let mut states: HashMap<String, Arc<JobState>> = HashMap::new();
        for job in jobs {
            if job.id.is_empty() {
                return Err(Error::config("job id must not be empty"));
            }
            if let Some(Trigger::Input { input_id }) = &job.trigger {
                if input_id.is_empty() {
                    return Err(Error::config(format!(
                        "input trigger for job {} is missing input_id",
                        job.id
                    )));
                }
                if !input_manager.contains(input_id) {
                    warn!(
                        job = %job.id,
                        input = %input_id,
                        "Job references an undefined input; it will never see data"
                    );
                }
            }

            let id = job.id.clone();
            let state = Arc::new(JobState::new(Arc::new(job), now));
            if states.insert(id.clone(), state).is_some() {
                return Err(Error::config(format!("duplicate job id: {id}")));
            }
        }

        let executor = Executor::new(Arc::new(registry), config.num_workers);

        Ok(Self {
            config,
            states,
            input_manager,
            executor,
            control_lock: tokio::sync::Mutex::new(()),
            cancellation_token,
        })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.cancellation_token.is_cancelled()
    }

    pub fn job_count(&self) -> usize {
        self.states.len()
    }

    /// Number of attempts currently holding a worker slot.
    pub fn active_attempts(&self) -> usize {
        self.executor.active_count()
    }

    /// Drive dispatch passes until cancelled, then wait for in-flight
    /// attempts to finish.
    pub async fn run(&self) -> Result<()> {
        info!(
            jobs = self.states.len(),
            inputs = self.input_manager.len(),
            tick_ms = self.config.tick.as_millis() as u64,
            workers = self.config.num_workers,
            "Scheduler started"
        );

        let mut tick = tokio::time::interval(self.config.tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancellation_token.cancelled() => break,
                _ = tick.tick() => {
                    self.dispatch_pass().await;
                }
            }
        }

        info!("Scheduler stopping; waiting for in-flight attempts");
        self.executor.shutdown().await;
        info!("Scheduler stopped");
        Ok(())
    }

    /// Request a graceful stop. In-flight attempts run to completion.
    pub fn stop(&self) {
        self.cancellation_token.cancel();
    }

    /// One dispatch pass over every job.
    async fn dispatch_pass(&self) {
        let _guard = self.control_lock.lock().await;

        for state in self.states.values() {
            let now = Utc::now();
            if !state.can_execute() {
                continue;
            }

            let definition = state.definition();
            match &definition.trigger {
                Some(Trigger::Input { input_id }) => {
                    let Some(next_run) = state.next_run_time() else {
                        continue;
                    };
                    if now < next_run {
                        continue;
                    }

                    if self.input_manager.has_data(input_id).await {
                        debug!(job = %definition.id, input = %input_id, "Input has data, dispatching");
                        self.dispatch(state);
                    } else {
                        // Stay eligible on the next tick without drifting.
                        state.schedule_next_run(now - chrono::Duration::seconds(1));
                    }
                }
                None => {
                    if let Some(next_run) = state.next_run_time()
                        && now >= next_run
                    {
                        debug!(job = %definition.id, "Dispatching");
                        self.dispatch(state);
                    }
                }
            }
        }
    }

    fn dispatch(&self, state: &Arc<JobState>) -> bool {
        if !state.begin_dispatch() {
            return false;
        }
        self.executor
            .submit(state.clone(), self.input_manager.clone());
        true
    }

    // Control operations.

    pub async fn get_job(&self, job_id: &str) -> Option<JobSnapshot> {
        let _guard = self.control_lock.lock().await;
        self.states.get(job_id).map(|state| state.snapshot())
    }

    /// Snapshots of every job, ordered by id.
    pub async fn list_jobs(&self) -> Vec<JobSnapshot> {
        let _guard = self.control_lock.lock().await;
        let mut snapshots: Vec<JobSnapshot> =
            self.states.values().map(|state| state.snapshot()).collect();
        snapshots.sort_by(|a, b| a.id.cmp(&b.id));
        snapshots
    }

    pub async fn pause_job(&self, job_id: &str) -> bool {
        let _guard = self.control_lock.lock().await;
        match self.states.get(job_id) {
            Some(state) => {
                state.pause();
                info!(job = %job_id, "Job paused");
                true
            }
            None => false,
        }
    }

    pub async fn resume_job(&self, job_id: &str) -> bool {
        let _guard = self.control_lock.lock().await;
        match self.states.get(job_id) {
            Some(state) => {
                state.resume();
                info!(job = %job_id, "Job resumed");
                true
            }
            None => false,
        }
    }

    pub async fn stop_job(&self, job_id: &str) -> bool {
        let _guard = self.control_lock.lock().await;
        match self.states.get(job_id) {
            Some(state) => {
                state.stop();
                info!(job = %job_id, "Job stopped");
                true
            }
            None => false,
        }
    }

    pub async fn enable_job(&self, job_id: &str) -> bool {
        let _guard = self.control_lock.lock().await;
        match self.states.get(job_id) {
            Some(state) => {
                state.enable();
                info!(job = %job_id, "Job enabled");
                true
            }
            None => false,
        }
    }

    /// Dispatch a job immediately, outside its schedule. Fails when the job
    /// is unknown, not active, or already running.
    pub async fn trigger_job(&self, job_id: &str) -> bool {
        let _guard = self.control_lock.lock().await;
        match self.states.get(job_id) {
            Some(state) => {
                if self.dispatch(state) {
                    info!(job = %job_id, "Job triggered manually");
                    true
                } else {
                    warn!(
                        job = %job_id,
                        status = %state.status(),
                        "Cannot trigger job in its current state"
                    );
                    false
                }
            }
            None => false,
        }
    }

    // Programmatic feeding.

    pub fn append_to_input(&self, input_id: &str, item: Value) -> bool {
        self.input_manager.append_to_input(input_id, item)
    }

    pub fn append_items_to_input(&self, input_id: &str, items: Vec<Value>) -> bool {
        self.input_manager.append_items_to_input(input_id, items)
    }

    pub fn input_manager(&self) -> &Arc<InputManager> {
        &self.input_manager
    }
}
