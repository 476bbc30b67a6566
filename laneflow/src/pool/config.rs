//! Configuration for worker pools.

use super::{FixedPool, TokioPool, WorkerPool};
use crate::errors::PipelineError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which executor backs a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    /// A multi-threaded tokio runtime. Reentrant.
    #[default]
    WorkStealing,
    /// A fixed-size thread pool. Not reentrant.
    Fixed,
}

/// Configuration for building a worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Executor flavour.
    #[serde(default)]
    pub kind: PoolKind,
    /// Number of worker threads.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Name given to worker threads.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
    /// Upper bound on threads used for blocking submissions (work-stealing only).
    #[serde(default)]
    pub max_blocking_threads: Option<usize>,
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
}

fn default_thread_name() -> String {
    "laneflow-worker".to_string()
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            kind: PoolKind::default(),
            worker_threads: default_worker_threads(),
            thread_name: default_thread_name(),
            max_blocking_threads: None,
        }
    }
}

impl PoolConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the pool kind.
    #[must_use]
    pub fn with_kind(mut self, kind: PoolKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the number of worker threads.
    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Sets the worker thread name.
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Sets the blocking thread limit.
    #[must_use]
    pub fn with_max_blocking_threads(mut self, threads: usize) -> Self {
        self.max_blocking_threads = Some(threads);
        self
    }

    /// Checks the configuration for values the executors reject.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.worker_threads == 0 {
            return Err(PipelineError::Config(
                "worker_threads must be greater than zero".to_string(),
            ));
        }
        if self.max_blocking_threads == Some(0) {
            return Err(PipelineError::Config(
                "max_blocking_threads must be greater than zero".to_string(),
            ));
        }
        if self.thread_name.is_empty() {
            return Err(PipelineError::Config("thread_name must not be empty".to_string()));
        }
        Ok(())
    }

    /// Builds the configured pool.
    pub fn build(&self) -> Result<Arc<dyn WorkerPool>, PipelineError> {
        let pool: Arc<dyn WorkerPool> = match self.kind {
            PoolKind::WorkStealing => Arc::new(TokioPool::new(self)?),
            PoolKind::Fixed => Arc::new(FixedPool::new(self)?),
        };
        Ok(pool)
    }
}
