//! Entry point that turns suppliers into the first stage of a dataflow.

use crate::core::Outcome;
use crate::errors::PipelineError;
use crate::pipeline::{default_error_handler, Lane, LaneHandle, LaneValue, Stage};
use crate::pool::{PoolConfig, TokioPool, WorkerPool};
use std::sync::Arc;

/// Creates stages on a shared worker pool.
///
/// Every stage derived from one `Dataflow` references the same pool and
/// starts with an error handler that logs unrecoverable failures.
#[derive(Debug, Clone)]
pub struct Dataflow {
    pool: Arc<dyn WorkerPool>,
}

impl Dataflow {
    /// Uses an existing pool.
    #[must_use]
    pub fn new(pool: Arc<dyn WorkerPool>) -> Self {
        Self { pool }
    }

    /// Builds a pool from the configuration.
    pub fn from_config(config: &PoolConfig) -> Result<Self, PipelineError> {
        Ok(Self::new(config.build()?))
    }

    /// Uses the tokio runtime of the calling context.
    pub fn current() -> Result<Self, PipelineError> {
        Ok(Self::new(Arc::new(TokioPool::current()?)))
    }

    /// Returns the shared pool.
    #[must_use]
    pub fn pool(&self) -> &Arc<dyn WorkerPool> {
        &self.pool
    }

    /// Starts one lane per supplier, each scheduled on the pool immediately.
    pub fn react<T, S, I>(&self, suppliers: I) -> Stage<T>
    where
        T: LaneValue,
        S: FnOnce() -> T + Send + 'static,
        I: IntoIterator<Item = S>,
    {
        self.start(suppliers.into_iter().map(|supplier| {
            Lane::spawn(&*self.pool, async move { Outcome::Value(supplier()) })
        }))
    }

    /// Like [`Dataflow::react`], for suppliers that may fail.
    pub fn try_react<T, E, S, I>(&self, suppliers: I) -> Stage<T>
    where
        T: LaneValue,
        E: Into<anyhow::Error>,
        S: FnOnce() -> Result<T, E> + Send + 'static,
        I: IntoIterator<Item = S>,
    {
        self.start(suppliers.into_iter().map(|supplier| {
            Lane::spawn(&*self.pool, async move { Outcome::from(supplier()) })
        }))
    }

    /// Starts one already-resolved lane per value.
    pub fn of<T, I>(&self, values: I) -> Stage<T>
    where
        T: LaneValue,
        I: IntoIterator<Item = T>,
    {
        self.start(
            values
                .into_iter()
                .map(|value| Lane::resolved(Outcome::Value(value))),
        )
    }

    /// Re-enters the builder from raw lane handles, such as those returned by
    /// [`Stage::with`].
    pub fn from_handles<T, I>(&self, handles: I) -> Stage<T>
    where
        T: LaneValue,
        I: IntoIterator<Item = LaneHandle<T>>,
    {
        self.start(handles.into_iter().map(Lane::from_handle))
    }

    fn start<T: LaneValue>(&self, lanes: impl Iterator<Item = Lane<T>>) -> Stage<T> {
        Stage::new(
            lanes.collect(),
            Arc::clone(&self.pool),
            Some(default_error_handler()),
        )
    }
}
