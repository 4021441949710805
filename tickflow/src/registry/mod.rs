//! Callable registry: name → target lookup populated at startup.
//!
//! Targets are keyed as `module.function` and invoked with a single context
//! carrying the polled batch plus the job's positional and keyword arguments;
//! each target destructures what it needs.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::inputs::InputItem;
use crate::{Error, Result};

mod builtins;

pub use builtins::install_builtins;

/// Everything a target receives for one attempt.
pub struct JobContext {
    /// Items pulled for this attempt; empty for jobs without an input trigger.
    pub batch: Vec<InputItem>,
    /// Positional arguments from the job definition.
    pub args: Vec<Value>,
    /// Keyword arguments from the job definition.
    pub kwargs: Map<String, Value>,
}

impl JobContext {
    /// Look up a keyword argument.
    pub fn kwarg(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key)
    }
}

/// A registered target callable.
#[derive(Clone)]
pub struct JobFn(Arc<dyn Fn(JobContext) -> BoxFuture<'static, Result<()>> + Send + Sync>);

impl JobFn {
    fn new<F>(f: F) -> Self
    where
        F: Fn(JobContext) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }
}

impl std::fmt::Debug for JobFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JobFn(..)")
    }
}

impl std::ops::Deref for JobFn {
    type Target = dyn Fn(JobContext) -> BoxFuture<'static, Result<()>> + Send + Sync;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

/// Startup-populated lookup from target name to callable.
#[derive(Default)]
pub struct Registry {
    targets: HashMap<String, JobFn>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target under `name` (conventionally `module.function`).
    /// A later registration under the same name replaces the earlier one.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, target: F)
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.targets
            .insert(name.into(), JobFn::new(move |ctx| Box::pin(target(ctx))));
    }

    /// Resolve a `(module, function)` pair to its callable.
    pub fn resolve(&self, module: &str, function: &str) -> Result<JobFn> {
        let key = format!("{module}.{function}");
        self.targets
            .get(&key)
            .cloned()
            .ok_or(Error::Resolution { target: key })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.targets.contains_key(name)
    }

    /// Registered target names, unordered.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }
}
