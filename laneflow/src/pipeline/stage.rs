//! The immutable stage builder.

use super::blocker::{gather, Blocker, ErrorHandler};
use super::collector::ResultCollector;
use super::extractors;
use super::lane::{Lane, LaneHandle, LaneValue};
use crate::core::{Outcome, Status};
use crate::errors::{LaneError, PipelineError};
use crate::pool::{self, WorkerPool};
use std::fmt;
use std::sync::Arc;

/// One step of a dataflow: a fixed, ordered set of lanes plus the pool they run
/// on and the handler that hears about unrecoverable failures.
///
/// Every builder method leaves `self` untouched and returns a new stage; only
/// the blocking family waits. `R` is the type of results cached by
/// [`Stage::collect_results`] and is `()` everywhere else.
///
/// ```rust,ignore
/// let strings = Dataflow::from_config(&PoolConfig::default())?
///     .react((1..=3).map(|i| move || i))
///     .then(|it| it * 100)
///     .then(|it| format!("*{it}"))
///     .block()?;
/// ```
pub struct Stage<T: LaneValue, R = ()> {
    lanes: Vec<Lane<T>>,
    pool: Arc<dyn WorkerPool>,
    error_handler: Option<ErrorHandler>,
    results: Option<Arc<R>>,
}

impl<T: LaneValue> Stage<T> {
    pub(crate) fn new(
        lanes: Vec<Lane<T>>,
        pool: Arc<dyn WorkerPool>,
        error_handler: Option<ErrorHandler>,
    ) -> Self {
        Self {
            lanes,
            pool,
            error_handler,
            results: None,
        }
    }
}

impl<T: LaneValue, R> Stage<T, R> {
    /// Returns the number of lanes.
    #[must_use]
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Returns the shared worker pool.
    #[must_use]
    pub fn pool(&self) -> &Arc<dyn WorkerPool> {
        &self.pool
    }

    /// Returns true if an error handler is installed.
    #[must_use]
    pub fn has_error_handler(&self) -> bool {
        self.error_handler.is_some()
    }

    /// Returns the raw handles behind this stage's lanes.
    #[must_use]
    pub fn handles(&self) -> Vec<LaneHandle<T>> {
        self.lanes.iter().map(Lane::handle).collect()
    }

    /// Results cached by [`Stage::collect_results`], if any.
    #[must_use]
    pub fn results(&self) -> Option<&R> {
        self.results.as_deref()
    }

    /// An owned copy of the cached results.
    #[must_use]
    pub fn extract_results(&self) -> Option<R>
    where
        R: Clone,
    {
        self.results.as_deref().cloned()
    }

    fn with_lanes<U: LaneValue>(&self, lanes: Vec<Lane<U>>) -> Stage<U> {
        Stage::new(lanes, Arc::clone(&self.pool), self.error_handler.clone())
    }

    pub(crate) fn with_results<C>(&self, results: C) -> Stage<T, C> {
        Stage {
            lanes: self.lanes.clone(),
            pool: Arc::clone(&self.pool),
            error_handler: self.error_handler.clone(),
            results: Some(Arc::new(results)),
        }
    }

    fn map_lanes<U, F>(&self, step: F) -> Stage<U>
    where
        U: LaneValue,
        F: Fn(Outcome<T>) -> Outcome<U> + Send + Sync + 'static,
    {
        let step = Arc::new(step);
        let lanes = self
            .lanes
            .iter()
            .map(|lane| {
                let step = Arc::clone(&step);
                lane.then(&*self.pool, move |outcome| step(outcome))
            })
            .collect();
        self.with_lanes(lanes)
    }

    fn blocker(&self) -> Blocker<T> {
        Blocker::new(self.lanes.clone(), self.error_handler.clone())
    }

    // ---- transformations ----

    /// Applies `f` to every lane's value on the pool.
    ///
    /// Filtered and failed lanes pass through without calling `f`. Does not
    /// block.
    pub fn then<U, F>(&self, f: F) -> Stage<U>
    where
        U: LaneValue,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        self.map_lanes(move |outcome| outcome.map(&f))
    }

    /// Like [`Stage::then`], but `f` may fail. An `Err` fails the lane.
    pub fn try_then<U, E, F>(&self, f: F) -> Stage<U>
    where
        U: LaneValue,
        E: Into<anyhow::Error>,
        F: Fn(T) -> Result<U, E> + Send + Sync + 'static,
    {
        self.map_lanes(move |outcome| outcome.and_then(|value| f(value).into()))
    }

    /// Looks at every value without changing it.
    pub fn peek<F>(&self, f: F) -> Stage<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.then(move |value| {
            f(&value);
            value
        })
    }

    /// Marks lanes whose value fails `predicate` as filtered.
    ///
    /// Filtered lanes keep their position but contribute nothing to later
    /// collections and are never reported as errors.
    pub fn filter<P>(&self, predicate: P) -> Stage<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.map_lanes(move |outcome| {
            outcome.and_then(|value| {
                if predicate(&value) {
                    Outcome::Value(value)
                } else {
                    Outcome::Filtered
                }
            })
        })
    }

    /// Recovers failed lanes with `f(cause)`.
    ///
    /// Successful lanes are unaffected and filtered lanes stay filtered.
    pub fn on_fail<F>(&self, f: F) -> Stage<T>
    where
        F: Fn(&LaneError) -> T + Send + Sync + 'static,
    {
        self.map_lanes(move |outcome| outcome.recover(&f))
    }

    /// Replaces the error handler.
    ///
    /// Nothing is reported now; the handler hears about each unrecoverable
    /// failure when a blocking or aggregating call observes it.
    pub fn capture<H>(&self, handler: H) -> Self
    where
        H: Fn(&LaneError) + Send + Sync + 'static,
    {
        Self {
            lanes: self.lanes.clone(),
            pool: Arc::clone(&self.pool),
            error_handler: Some(Arc::new(handler)),
            results: self.results.clone(),
        }
    }

    /// Barrier: once every lane has resolved, applies `f` to the kept values.
    ///
    /// Returns immediately with a single-lane stage. Unrecoverable failures
    /// are reported to the handler when the barrier observes them; a panic in
    /// `f` fails the new lane and is reported by whoever blocks on it.
    ///
    /// On a reentrant pool `f` runs on the pool's blocking threads, so it may
    /// itself block on further work from the same pool. Otherwise it runs on
    /// the worker that resolved the barrier.
    pub fn all_of<U, F>(&self, f: F) -> Stage<U>
    where
        U: LaneValue,
        F: FnOnce(Vec<T>) -> U + Send + 'static,
    {
        self.all_of_into::<Vec<T>, U, F>(f)
    }

    /// Barrier that gathers the kept values into `C` before applying `f`.
    pub fn all_of_into<C, U, F>(&self, f: F) -> Stage<U>
    where
        C: FromIterator<T>,
        U: LaneValue,
        F: FnOnce(C) -> U + Send + 'static,
    {
        let lanes = self.lanes.clone();
        let error_handler = self.error_handler.clone();
        let blocking = self.pool.as_reentrant().map(|reentrant| reentrant.detach());
        let barrier = Lane::spawn(&*self.pool, async move {
            let values = match gather(&lanes, error_handler.as_ref()).await {
                Ok(values) => values,
                Err(interrupted) => return Outcome::Failed(interrupted),
            };
            let reduce = move || f(values.into_iter().collect::<C>());

            let Some(blocking) = blocking else {
                return Outcome::Value(reduce());
            };
            let reduced = pool::dispatch_blocking(&*blocking, reduce);
            match reduced.await {
                Ok(Ok(value)) => Outcome::Value(value),
                Ok(Err(payload)) => Outcome::Failed(LaneError::from_panic(payload)),
                Err(_) => Outcome::Failed(LaneError::interrupted()),
            }
        });
        self.with_lanes(vec![barrier])
    }

    /// Applies `f` to every lane and hands back the raw handles.
    pub fn with<U, F>(&self, f: F) -> Vec<LaneHandle<U>>
    where
        U: LaneValue,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        self.then(f).handles()
    }

    // ---- blocking ----

    /// Blocks until every lane resolves and returns the kept values in lane
    /// order.
    ///
    /// Never fails because of a lane's own failure. Errors only when a lane
    /// was interrupted.
    ///
    /// Blocks the calling thread. Do not call it from an async task running on
    /// this stage's pool: on a single worker the lanes can never make progress.
    /// From inside the pool, use [`Stage::submit_and_block`] or block within an
    /// [`Stage::all_of`] reducer instead.
    pub fn block(&self) -> Result<Vec<T>, PipelineError> {
        self.block_until(|_| false)
    }

    /// Blocks until every lane resolves and collects the kept values into `C`.
    pub fn block_into<C>(&self) -> Result<C, PipelineError>
    where
        C: FromIterator<T>,
    {
        self.block_into_until(|_| false)
    }

    /// Blocks lane by lane until `breakout` returns true or all lanes resolve.
    ///
    /// Lanes after the breakout point keep running; their results are
    /// neither waited for nor included.
    pub fn block_until<B>(&self, breakout: B) -> Result<Vec<T>, PipelineError>
    where
        B: Fn(&Status) -> bool,
    {
        self.blocker().block(breakout)
    }

    /// Breakout collection gathered into `C`.
    pub fn block_into_until<C, B>(&self, breakout: B) -> Result<C, PipelineError>
    where
        C: FromIterator<T>,
        B: Fn(&Status) -> bool,
    {
        Ok(self.block_until(breakout)?.into_iter().collect())
    }

    /// Returns the first kept value, blocking only until a second lane has
    /// resolved.
    ///
    /// "First" means lowest lane index among the lanes awaited, not first to
    /// finish: lanes are awaited in index order, so this is the first result
    /// only when lanes also complete in index order.
    pub fn first(&self) -> Result<T, PipelineError> {
        self.block_and_extract_until(extractors::first, |status| status.completed > 1)
    }

    /// Blocks for every lane and returns the last kept value.
    pub fn last(&self) -> Result<T, PipelineError> {
        self.block_and_extract(extractors::last)
    }

    /// Blocks for every lane and hands the kept values to `extractor`.
    pub fn block_and_extract<X, E>(&self, extractor: E) -> Result<X, PipelineError>
    where
        E: FnOnce(Vec<T>) -> Result<X, PipelineError>,
    {
        self.block_and_extract_until(extractor, |_| false)
    }

    /// Breakout collection handed to `extractor`.
    pub fn block_and_extract_until<X, E, B>(
        &self,
        extractor: E,
        breakout: B,
    ) -> Result<X, PipelineError>
    where
        E: FnOnce(Vec<T>) -> Result<X, PipelineError>,
        B: Fn(&Status) -> bool,
    {
        extractor(self.block_until(breakout)?)
    }

    /// Starts an explicit collect-then-reduce sequence.
    #[must_use]
    pub fn collect_results(&self) -> ResultCollector<T> {
        ResultCollector::new(self.with_lanes(self.lanes.clone()))
    }
}

impl<T: LaneValue, R: Send + Sync + 'static> Stage<T, R> {
    /// Runs `f` with the cached results on the worker pool if the pool is
    /// reentrant, so parallel work started inside `f` reuses its threads.
    ///
    /// Otherwise `f` runs inline on the calling thread, with whatever
    /// thread-local state that thread has. A panic in `f` is returned as
    /// [`PipelineError::Execution`].
    pub fn submit<O, F>(&self, f: F) -> Result<O, PipelineError>
    where
        O: Send + 'static,
        F: FnOnce(Option<Arc<R>>) -> O + Send + 'static,
    {
        let results = self.results.clone();
        pool::submit(&*self.pool, move || f(results))
    }

    /// Blocks for every lane from inside submitted work and applies `f` to the
    /// kept values.
    pub fn submit_and_block<O, F>(&self, f: F) -> Result<O, PipelineError>
    where
        O: Send + 'static,
        F: FnOnce(Vec<T>) -> O + Send + 'static,
    {
        let blocker = self.blocker();
        pool::submit(&*self.pool, move || blocker.block(|_| false).map(f))?
    }
}

impl<T: LaneValue, R> Clone for Stage<T, R> {
    fn clone(&self) -> Self {
        Self {
            lanes: self.lanes.clone(),
            pool: Arc::clone(&self.pool),
            error_handler: self.error_handler.clone(),
            results: self.results.clone(),
        }
    }
}

impl<T: LaneValue, R> fmt::Debug for Stage<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("lanes", &self.lanes.len())
            .field("pool", &self.pool)
            .field("has_error_handler", &self.error_handler.is_some())
            .field("has_results", &self.results.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolConfig;
    use crate::source::Dataflow;
    use crate::testing::{assert_lane_count, fixed_dataflow, test_dataflow, RecordingHandler};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn one_two_three() -> Stage<i32> {
        test_dataflow().react((1..=3).map(|i| move || i))
    }

    #[test]
    fn test_then_preserves_order() {
        let values = one_two_three().then(|it| it * 100).block().unwrap();
        assert_eq!(values, vec![100, 200, 300]);
    }

    #[test]
    fn test_transformations_leave_receiver_untouched() {
        let stage = one_two_three();
        let doubled = stage.then(|it| it * 2);

        assert_eq!(stage.block().unwrap(), vec![1, 2, 3]);
        assert_eq!(doubled.block().unwrap(), vec![2, 4, 6]);
    }

    #[test]
    fn test_try_then_failure_is_reported() {
        let recorder = RecordingHandler::new();
        let values = one_two_three()
            .try_then(|it| {
                if it == 2 {
                    Err(anyhow::anyhow!("even numbers are suspicious"))
                } else {
                    Ok(it)
                }
            })
            .capture(recorder.callback())
            .block()
            .unwrap();

        assert_eq!(values, vec![1, 3]);
        assert_eq!(recorder.messages(), vec!["even numbers are suspicious".to_string()]);
    }

    #[test]
    fn test_peek_sees_every_value() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);

        let values = one_two_three()
            .peek(move |it| {
                counter.fetch_add(usize::try_from(*it).unwrap(), Ordering::SeqCst);
            })
            .block()
            .unwrap();

        assert_eq!(values, vec![1, 2, 3]);
        assert_eq!(seen.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_filter_keeps_positions() {
        let filtered = one_two_three().then(|it| it * 100).filter(|it| *it > 150);

        assert_lane_count(&filtered, 3);
        assert_eq!(filtered.block().unwrap(), vec![200, 300]);
    }

    #[test]
    fn test_filter_then_skips_filtered_lanes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let values = one_two_three()
            .filter(|it| *it != 2)
            .then(move |it| {
                counter.fetch_add(1, Ordering::SeqCst);
                it
            })
            .block()
            .unwrap();

        assert_eq!(values, vec![1, 3]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_on_fail_does_not_recover_filtered() {
        let values = one_two_three()
            .filter(|it| *it != 1)
            .on_fail(|_| -1)
            .block()
            .unwrap();
        assert_eq!(values, vec![2, 3]);
    }

    #[test]
    fn test_on_fail_sees_original_cause() {
        #[derive(Debug, thiserror::Error)]
        #[error("lane {0} rejected")]
        struct Rejected(i32);

        let values = one_two_three()
            .try_then(|it| if it == 3 { Err(Rejected(it)) } else { Ok(it) })
            .on_fail(|cause| -cause.downcast_ref::<Rejected>().map_or(0, |r| r.0))
            .block()
            .unwrap();

        assert_eq!(values, vec![1, 2, -3]);
    }

    #[test]
    fn test_capture_does_not_fire_until_blocking() {
        let recorder = RecordingHandler::new();
        let stage = one_two_three()
            .try_then(|_| Err::<i32, _>(anyhow::anyhow!("always")))
            .capture(recorder.callback());

        assert!(stage.has_error_handler());
        assert_eq!(recorder.count(), 0);

        assert!(stage.block().unwrap().is_empty());
        assert_eq!(recorder.count(), 3);
    }

    #[test]
    fn test_block_into_collects() {
        let set: BTreeSet<i32> = one_two_three().then(|it| it % 2).block_into().unwrap();
        assert_eq!(set, BTreeSet::from([0, 1]));

        let joined: String = test_dataflow()
            .of(vec!["a", "b", "c"])
            .block_into()
            .unwrap();
        assert_eq!(joined, "abc");
    }

    #[test]
    fn test_first_and_last() {
        let stage = one_two_three().then(|it| it * 100);
        assert_eq!(stage.first().unwrap(), 100);
        assert_eq!(stage.last().unwrap(), 300);
    }

    #[test]
    fn test_last_on_empty_result() {
        let stage = one_two_three().filter(|_| false);
        assert!(matches!(stage.last(), Err(PipelineError::EmptyResult)));
        assert!(matches!(stage.first(), Err(PipelineError::EmptyResult)));
    }

    #[test]
    fn test_block_and_extract_custom() {
        let max = one_two_three()
            .block_and_extract(|values| values.into_iter().max().ok_or(PipelineError::EmptyResult))
            .unwrap();
        assert_eq!(max, 3);
    }

    #[test]
    fn test_all_of_collapses_to_one_lane() {
        let total = one_two_three().then(|it| it * 100).all_of(|values| values.len());

        assert_lane_count(&total, 1);
        assert_eq!(total.block().unwrap(), vec![3]);
    }

    #[test]
    fn test_all_of_into_collector() {
        let sum = one_two_three()
            .all_of_into::<BTreeSet<i32>, _, _>(|set| set.iter().sum::<i32>())
            .first()
            .unwrap();
        assert_eq!(sum, 6);
    }

    #[test]
    fn test_all_of_panic_is_reported_later() {
        let recorder = RecordingHandler::new();
        let stage = one_two_three()
            .capture(recorder.callback())
            .all_of(|values: Vec<i32>| -> i32 { panic!("cannot reduce {} values", values.len()) });

        assert!(stage.block().unwrap().is_empty());
        assert_eq!(recorder.count(), 1);
        assert!(recorder.messages()[0].contains("cannot reduce 3 values"));
    }

    #[test]
    fn test_all_of_reducer_can_block_on_same_pool() {
        let dataflow = Dataflow::from_config(&PoolConfig::new().with_worker_threads(1)).unwrap();
        let inner = dataflow.clone();

        let total = dataflow
            .of(vec![1, 2])
            .all_of(move |values| {
                let nested = inner
                    .react((0..3).map(|i| move || i))
                    .then(|it| it + 1)
                    .block()
                    .unwrap_or_default();
                values.len() + nested.len()
            })
            .first()
            .unwrap();
        assert_eq!(total, 5);
    }

    #[test]
    fn test_all_of_reducer_runs_inline_on_fixed_pool() {
        let sum = fixed_dataflow(1)
            .of(vec![1, 2, 3])
            .all_of(|values| values.iter().sum::<i32>())
            .first()
            .unwrap();
        assert_eq!(sum, 6);
    }

    #[test]
    fn test_handles_match_lane_count() {
        let stage = one_two_three();
        assert_eq!(stage.handles().len(), stage.lane_count());
    }

    #[test]
    fn test_with_returns_raw_handles() {
        let handles = one_two_three().with(|it| it + 1);
        assert_eq!(handles.len(), 3);

        let values: Vec<i32> = handles
            .into_iter()
            .filter_map(|h| match futures::executor::block_on(h) {
                Outcome::Value(v) => Some(v),
                _ => None,
            })
            .collect();
        assert_eq!(values, vec![2, 3, 4]);
    }

    #[test]
    fn test_submit_with_cached_results() {
        let collected = one_two_three().then(|it| it * 200).collect_results().block().unwrap();

        let reduced = collected
            .submit(|results| {
                results
                    .map(|r| r.iter().filter(|v| **v > 300).map(|v| v - 5).sum::<i32>())
                    .unwrap_or_default()
            })
            .unwrap();
        assert_eq!(reduced, 395 + 595);
    }

    #[test]
    fn test_submit_without_results() {
        let count = one_two_three().submit(|results| results.is_none()).unwrap();
        assert!(count);
    }

    #[test]
    fn test_submit_and_block() {
        let len = one_two_three().submit_and_block(|values| values.len()).unwrap();
        assert_eq!(len, 3);
    }

    #[test]
    fn test_submit_panic_is_execution_error() {
        let err = one_two_three()
            .submit(|_| -> i32 { panic!("submitted work failed") })
            .unwrap_err();
        assert!(matches!(err, PipelineError::Execution(msg) if msg.contains("submitted work failed")));
    }

    #[test]
    fn test_debug_output() {
        let debug = format!("{:?}", one_two_three());
        assert!(debug.contains("lanes: 3"));
    }
}
