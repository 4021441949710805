//! Scheduler: tick-driven dispatch over per-job runtime state.
//!
//! The loop never executes user code directly. Every tick it decides which
//! jobs are eligible, hands them to the bounded executor, and goes back to
//! sleep; workers write their outcome back into the job's runtime record.

pub mod executor;
pub mod runtime;
mod service;

pub use executor::{DEFAULT_NUM_WORKERS, Executor};
pub use runtime::{JobSnapshot, JobState, JobStatus, RetryDecision};
pub use service::{Scheduler, SchedulerConfig};
