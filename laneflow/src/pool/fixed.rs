//! Fixed-size thread pool for callers that do not run tokio.

use super::{PoolConfig, WorkerPool};
use crate::errors::PipelineError;
use futures::executor::ThreadPool;
use futures::future::BoxFuture;
use std::fmt;

/// A generic executor with a fixed number of threads.
///
/// Never reentrant: `submit` on a stage backed by this pool runs inline on
/// the calling thread.
#[derive(Clone)]
pub struct FixedPool {
    inner: ThreadPool,
    size: usize,
}

impl FixedPool {
    /// Creates a pool from the configuration.
    pub fn new(config: &PoolConfig) -> Result<Self, PipelineError> {
        config.validate()?;

        let inner = ThreadPool::builder()
            .pool_size(config.worker_threads)
            .name_prefix(format!("{}-", config.thread_name))
            .create()?;

        Ok(Self {
            inner,
            size: config.worker_threads,
        })
    }

    /// Creates a pool with `size` threads and default naming.
    pub fn with_size(size: usize) -> Result<Self, PipelineError> {
        Self::new(&PoolConfig::default().with_worker_threads(size))
    }

    /// Returns the number of threads.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }
}

impl WorkerPool for FixedPool {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        self.inner.spawn_ok(task);
    }
}

impl fmt::Debug for FixedPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedPool").field("size", &self.size).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;
    use futures::FutureExt;

    #[test]
    fn test_fixed_pool_runs_tasks() {
        let pool = FixedPool::with_size(2).unwrap();
        assert_eq!(pool.size(), 2);

        let (tx, rx) = oneshot::channel();
        pool.spawn(
            async move {
                let _ = tx.send("done");
            }
            .boxed(),
        );
        assert_eq!(futures::executor::block_on(rx).unwrap(), "done");
    }

    #[test]
    fn test_fixed_pool_is_never_reentrant() {
        let pool = FixedPool::with_size(1).unwrap();
        assert!(pool.as_reentrant().is_none());
    }

    #[test]
    fn test_zero_threads_rejected() {
        let err = FixedPool::with_size(0).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
