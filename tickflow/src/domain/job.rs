//! Job definitions: what to run, when to run it, and how to retry it.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Default batch size for input-triggered jobs.
pub const DEFAULT_BATCH_SIZE: usize = 10;
/// Default number of retries before a job is disabled.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default delay between retries.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);
/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// How a job decides its next run time.
#[derive(Debug, Clone)]
pub enum Schedule {
    /// Cron expression, evaluated in UTC.
    Cron(cron::Schedule),
    /// Fixed cadence anchored to completion of the previous run.
    Interval(Duration),
    /// A single absolute instant.
    OneOff(DateTime<Utc>),
    /// Never self-scheduled; runs only via a manual trigger.
    OnDemand,
}

impl Schedule {
    /// Parse a cron schedule, accepting standard 5-field expressions.
    ///
    /// The cron library wants a leading seconds field; a 5-field expression
    /// is normalized to fire at second zero.
    pub fn cron(expr: &str) -> Result<Self, cron::error::Error> {
        let expr = expr.trim();
        let normalized = if expr.split_whitespace().count() == 5 {
            format!("0 {expr}")
        } else {
            expr.to_string()
        };
        Ok(Self::Cron(cron::Schedule::from_str(&normalized)?))
    }

    pub fn interval_secs(seconds: u64) -> Self {
        Self::Interval(Duration::from_secs(seconds))
    }

    pub fn one_off(run_at: DateTime<Utc>) -> Self {
        Self::OneOff(run_at)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Cron(_) => "cron",
            Self::Interval(_) => "interval",
            Self::OneOff(_) => "one_off",
            Self::OnDemand => "on_demand",
        }
    }
}

/// An additional execution condition beyond the schedule.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Execution additionally requires the referenced input to have data.
    Input { input_id: String },
}

/// A declaratively-defined job, immutable after load.
#[derive(Debug, Clone)]
pub struct JobDefinition {
    /// Unique job identifier.
    pub id: String,
    /// Registry module of the target callable.
    pub module: String,
    /// Registry function of the target callable.
    pub function: String,
    /// When the job is eligible to run.
    pub schedule: Schedule,
    /// Optional input-readiness condition.
    pub trigger: Option<Trigger>,
    /// Positional arguments passed to the target.
    pub args: Vec<Value>,
    /// Keyword arguments passed to the target.
    pub kwargs: Map<String, Value>,
    /// Items pulled per attempt for input-triggered jobs.
    pub batch_size: usize,
    /// Failures tolerated before the job is disabled.
    pub max_retries: u32,
    /// Delay before a failed attempt is retried.
    pub retry_delay: Duration,
    /// Hard bound on a single attempt.
    pub timeout: Duration,
    /// Initial enablement.
    pub enabled: bool,
}

impl JobDefinition {
    /// Create a definition with default tuning knobs.
    pub fn new(
        id: impl Into<String>,
        module: impl Into<String>,
        function: impl Into<String>,
        schedule: Schedule,
    ) -> Self {
        Self {
            id: id.into(),
            module: module.into(),
            function: function.into(),
            schedule,
            trigger: None,
            args: Vec::new(),
            kwargs: Map::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            timeout: DEFAULT_TIMEOUT,
            enabled: true,
        }
    }

    /// Attach an input trigger.
    pub fn with_input_trigger(mut self, input_id: impl Into<String>) -> Self {
        self.trigger = Some(Trigger::Input {
            input_id: input_id.into(),
        });
        self
    }

    /// Set positional arguments.
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Set keyword arguments.
    pub fn with_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.kwargs = kwargs;
        self
    }

    /// Set the input batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the retry policy.
    pub fn with_retry_policy(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    /// Set the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the initial enablement.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Registry key of the target callable.
    pub fn target(&self) -> String {
        format!("{}.{}", self.module, self.function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_field_cron_is_accepted() {
        let schedule = Schedule::cron("*/5 * * * *").unwrap();
        assert_eq!(schedule.kind(), "cron");
    }

    #[test]
    fn test_six_field_cron_is_accepted() {
        assert!(Schedule::cron("0 30 9 * * *").is_ok());
    }

    #[test]
    fn test_invalid_cron_is_rejected() {
        assert!(Schedule::cron("not a cron").is_err());
    }

    #[test]
    fn test_definition_defaults() {
        let job = JobDefinition::new("j1", "demo", "noop", Schedule::interval_secs(5));
        assert_eq!(job.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(job.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(job.retry_delay, DEFAULT_RETRY_DELAY);
        assert_eq!(job.timeout, DEFAULT_TIMEOUT);
        assert!(job.enabled);
        assert_eq!(job.target(), "demo.noop");
    }
}
