//! Work-stealing pool backed by a tokio runtime.

use super::{BlockingWork, PoolConfig, ReentrantPool, WorkerPool};
use crate::errors::PipelineError;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};

/// A worker pool running on a tokio runtime.
///
/// The pool is reentrant when the runtime is multi-threaded: blocking work
/// submitted through `submit` runs on the runtime's blocking threads, where the
/// runtime context is entered, so nested `tokio::spawn` calls land on the same
/// workers.
#[derive(Clone)]
pub struct TokioPool {
    handle: Handle,
    /// Keeps an owned runtime alive for as long as any stage references it.
    runtime: Option<Arc<OwnedRuntime>>,
}

/// An owned runtime that may be released from any thread.
///
/// Tokio refuses to drop a runtime where blocking is not allowed, so inside
/// any runtime context the last owner shuts it down in the background instead.
struct OwnedRuntime(Option<Runtime>);

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            if Handle::try_current().is_ok() {
                runtime.shutdown_background();
            }
        }
    }
}

impl TokioPool {
    /// Builds a dedicated multi-threaded runtime from the configuration.
    pub fn new(config: &PoolConfig) -> Result<Self, PipelineError> {
        config.validate()?;

        let mut builder = Builder::new_multi_thread();
        builder
            .enable_all()
            .thread_name(config.thread_name.clone())
            .worker_threads(config.worker_threads);
        if let Some(max) = config.max_blocking_threads {
            builder.max_blocking_threads(max);
        }
        let runtime = builder.build()?;

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(Arc::new(OwnedRuntime(Some(runtime)))),
        })
    }

    /// Wraps an existing runtime handle. The caller keeps the runtime alive.
    #[must_use]
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            runtime: None,
        }
    }

    /// Wraps the runtime of the calling context.
    pub fn current() -> Result<Self, PipelineError> {
        Handle::try_current()
            .map(Self::from_handle)
            .map_err(|e| PipelineError::Config(format!("no tokio runtime in context: {e}")))
    }

    /// Returns the runtime handle.
    #[must_use]
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Returns true if the pool owns its runtime.
    #[must_use]
    pub fn owns_runtime(&self) -> bool {
        self.runtime.is_some()
    }

    fn is_multi_thread(&self) -> bool {
        matches!(self.handle.runtime_flavor(), RuntimeFlavor::MultiThread)
    }
}

impl WorkerPool for TokioPool {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        drop(self.handle.spawn(task));
    }

    fn as_reentrant(&self) -> Option<&dyn ReentrantPool> {
        if self.is_multi_thread() {
            Some(self)
        } else {
            None
        }
    }
}

impl ReentrantPool for TokioPool {
    fn spawn_blocking(&self, work: BlockingWork) {
        drop(self.handle.spawn_blocking(work));
    }

    fn detach(&self) -> Arc<dyn ReentrantPool> {
        Arc::new(Self::from_handle(self.handle.clone()))
    }
}

impl fmt::Debug for TokioPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioPool")
            .field("flavor", &self.handle.runtime_flavor())
            .field("owns_runtime", &self.owns_runtime())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::dispatch_blocking;
    use crate::source::Dataflow;
    use futures::channel::oneshot;
    use futures::FutureExt;

    #[test]
    fn test_owned_pool_runs_tasks() {
        let pool = TokioPool::new(&PoolConfig::default().with_worker_threads(2)).unwrap();
        assert!(pool.owns_runtime());

        let (tx, rx) = oneshot::channel();
        pool.spawn(
            async move {
                let _ = tx.send(7);
            }
            .boxed(),
        );
        assert_eq!(futures::executor::block_on(rx).unwrap(), 7);
    }

    #[test]
    fn test_multi_thread_pool_is_reentrant() {
        let pool = TokioPool::new(&PoolConfig::default().with_worker_threads(2)).unwrap();
        assert!(pool.as_reentrant().is_some());
    }

    #[test]
    fn test_current_thread_runtime_is_not_reentrant() {
        let runtime = Builder::new_current_thread().build().unwrap();
        let pool = TokioPool::from_handle(runtime.handle().clone());

        assert!(!pool.owns_runtime());
        assert!(pool.as_reentrant().is_none());
    }

    #[test]
    fn test_current_outside_runtime_fails() {
        let err = TokioPool::current().unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_owned_pool_dropped_inside_async_context() {
        let outer = Builder::new_current_thread().build().unwrap();

        let values = outer
            .block_on(async {
                let dataflow =
                    Dataflow::from_config(&PoolConfig::new().with_worker_threads(1)).unwrap();
                dataflow.react((1..=3).map(|i| move || i)).block()
            })
            .unwrap();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_detached_pool_does_not_own_runtime() {
        let pool = TokioPool::new(&PoolConfig::default().with_worker_threads(1)).unwrap();
        let detached = pool.as_reentrant().unwrap().detach();

        let value = futures::executor::block_on(dispatch_blocking(&*detached, || 6 * 7));
        assert_eq!(value.unwrap().unwrap(), 42);
    }

    #[test]
    fn test_blocking_work_sees_runtime_context() {
        let pool = TokioPool::new(&PoolConfig::default().with_worker_threads(2)).unwrap();
        let reentrant = pool.as_reentrant().unwrap();

        let (tx, rx) = oneshot::channel();
        reentrant.spawn_blocking(Box::new(move || {
            let _ = tx.send(Handle::try_current().is_ok());
        }));
        assert!(futures::executor::block_on(rx).unwrap());
    }
}
