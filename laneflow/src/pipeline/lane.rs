//! A single asynchronously resolved unit of work.

use crate::core::Outcome;
use crate::errors::LaneError;
use crate::pool::WorkerPool;
use futures::channel::oneshot;
use futures::future::{self, BoxFuture, Shared};
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// The raw, clonable handle behind a lane. Every clone observes the same
/// single resolution.
pub type LaneHandle<T> = Shared<BoxFuture<'static, Outcome<T>>>;

/// Values that can travel through a lane.
pub trait LaneValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> LaneValue for T {}

/// One independent computation chain tracked by a stage.
///
/// A lane never changes once created; deriving work from it produces a new
/// lane whose task awaits this one.
pub struct Lane<T: LaneValue> {
    handle: LaneHandle<T>,
}

impl<T: LaneValue> Lane<T> {
    /// Schedules `work` on the pool and returns the lane that will hold its
    /// outcome.
    ///
    /// A panic inside `work` resolves the lane as `Failed` with a
    /// [`LaneErrorKind::Panicked`](crate::errors::LaneErrorKind) cause. If the
    /// pool drops the task before it finishes, the lane resolves as interrupted.
    pub fn spawn<F>(pool: &dyn WorkerPool, work: F) -> Self
    where
        F: Future<Output = Outcome<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        pool.spawn(
            async move {
                let outcome = match AssertUnwindSafe(work).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(payload) => Outcome::Failed(LaneError::from_panic(payload)),
                };
                // The receiving lane may already be gone.
                let _ = tx.send(outcome);
            }
            .boxed(),
        );

        let handle = rx
            .map(|received| received.unwrap_or_else(|_| Outcome::Failed(LaneError::interrupted())))
            .boxed()
            .shared();
        Self { handle }
    }

    /// Creates a lane that is already resolved.
    #[must_use]
    pub fn resolved(outcome: Outcome<T>) -> Self {
        Self {
            handle: future::ready(outcome).boxed().shared(),
        }
    }

    /// Wraps an existing handle.
    #[must_use]
    pub fn from_handle(handle: LaneHandle<T>) -> Self {
        Self { handle }
    }

    /// Returns a clone of the underlying handle.
    #[must_use]
    pub fn handle(&self) -> LaneHandle<T> {
        self.handle.clone()
    }

    /// Derives a new lane that applies `step` to this lane's outcome on the pool.
    pub fn then<U, F>(&self, pool: &dyn WorkerPool, step: F) -> Lane<U>
    where
        U: LaneValue,
        F: FnOnce(Outcome<T>) -> Outcome<U> + Send + 'static,
    {
        let upstream = self.handle.clone();
        Lane::spawn(pool, async move { step(upstream.await) })
    }

    /// Awaits the outcome without blocking a thread.
    pub async fn outcome(&self) -> Outcome<T> {
        self.handle.clone().await
    }

    /// Blocks the calling thread until the lane resolves.
    ///
    /// Must not be called from inside an async task of the pool that runs
    /// this lane's chain on a single thread.
    pub fn wait(&self) -> Outcome<T> {
        futures::executor::block_on(self.handle.clone())
    }
}

impl<T: LaneValue> Clone for Lane<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
        }
    }
}

impl<T: LaneValue> fmt::Debug for Lane<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lane")
            .field("observed", &self.handle.peek().is_some())
            .finish()
    }
}
