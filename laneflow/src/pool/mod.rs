//! Worker pools that execute lanes and their continuations.
//!
//! This module provides:
//! - The [`WorkerPool`] trait every stage schedules onto
//! - The [`ReentrantPool`] capability for pools that accept blocking submissions
//! - A work-stealing tokio pool and a fixed-size thread pool
//! - Pool configuration

mod config;
mod fixed;
mod tokio_pool;

pub use config::{PoolConfig, PoolKind};
pub use fixed::FixedPool;
pub use tokio_pool::TokioPool;

use crate::errors::{panic_message, PipelineError};
use futures::channel::oneshot;
use futures::future::BoxFuture;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use tracing::debug;

/// A unit of blocking work handed to a [`ReentrantPool`].
pub type BlockingWork = Box<dyn FnOnce() + Send + 'static>;

/// An executor shared by every stage derived from one source.
///
/// Stages reference the pool, they never own it exclusively. Tasks spawned
/// here must not hold the pool themselves.
pub trait WorkerPool: Send + Sync + fmt::Debug {
    /// Schedules a task. A task the pool drops without polling to completion
    /// surfaces as an interrupted lane.
    fn spawn(&self, task: BoxFuture<'static, ()>);

    /// Returns the pool's blocking-submission capability, if it has one.
    ///
    /// Pools that return `None` cause `submit` to run work inline on the
    /// calling thread.
    fn as_reentrant(&self) -> Option<&dyn ReentrantPool> {
        None
    }
}

/// A pool whose threads may run blocking work that itself schedules more work
/// onto the same pool.
pub trait ReentrantPool: Send + Sync {
    /// Runs `work` on a pool thread.
    fn spawn_blocking(&self, work: BlockingWork);

    /// Returns a handle to the same blocking threads that does not keep the
    /// pool alive, safe to move into tasks running on the pool.
    fn detach(&self) -> Arc<dyn ReentrantPool>;
}

/// Hands `work` to the pool's blocking threads and returns the receiver of its
/// result. A panic in `work` arrives as `Ok(Err(payload))`; a pool that drops
/// the work closes the channel.
pub(crate) fn dispatch_blocking<O, F>(
    pool: &dyn ReentrantPool,
    work: F,
) -> oneshot::Receiver<thread::Result<O>>
where
    O: Send + 'static,
    F: FnOnce() -> O + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    pool.spawn_blocking(Box::new(move || {
        let _ = tx.send(panic::catch_unwind(AssertUnwindSafe(work)));
    }));
    rx
}

/// Runs `work` to completion and returns its result.
///
/// On a reentrant pool the work runs on a pool thread while the caller waits.
/// Otherwise it runs inline on the calling thread.
pub(crate) fn submit<O, F>(pool: &dyn WorkerPool, work: F) -> Result<O, PipelineError>
where
    O: Send + 'static,
    F: FnOnce() -> O + Send + 'static,
{
    let Some(reentrant) = pool.as_reentrant() else {
        debug!(?pool, "Pool is not reentrant, running submitted work on the calling thread");
        return panic::catch_unwind(AssertUnwindSafe(work))
            .map_err(|payload| PipelineError::Execution(panic_message(&*payload)));
    };

    debug!(?pool, "Submitted work to reentrant pool, nested parallel work will reuse its threads");
    match futures::executor::block_on(dispatch_blocking(reentrant, work)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(payload)) => Err(PipelineError::Execution(panic_message(&*payload))),
        Err(_) => Err(PipelineError::Submission(
            "worker pool dropped the submitted work".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_submit_runs_on_pool_thread_when_reentrant() {
        let pool = TokioPool::new(&PoolConfig::new().with_worker_threads(1)).unwrap();
        let caller = thread::current().id();

        let ran_on = submit(&pool, || thread::current().id()).unwrap();
        assert_ne!(ran_on, caller);
    }

    #[test]
    fn test_submit_runs_inline_otherwise() {
        let pool = FixedPool::with_size(1).unwrap();
        let caller = thread::current().id();

        let ran_on = submit(&pool, || thread::current().id()).unwrap();
        assert_eq!(ran_on, caller);
    }

    #[test]
    fn test_submit_nested_spawn_reuses_runtime() {
        let pool = TokioPool::new(&PoolConfig::new().with_worker_threads(2)).unwrap();

        let value = submit(&pool, || {
            let handle = tokio::runtime::Handle::current();
            futures::executor::block_on(handle.spawn(async { 21 * 2 })).unwrap_or_default()
        })
        .unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_submit_inline_panic() {
        let pool = FixedPool::with_size(1).unwrap();
        let err = submit(&pool, || -> u8 { panic!("inline failure") }).unwrap_err();
        assert!(matches!(err, PipelineError::Execution(msg) if msg == "inline failure"));
    }
}
