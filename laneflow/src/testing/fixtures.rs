//! Test fixtures.

use crate::pool::{FixedPool, PoolConfig, TokioPool, WorkerPool};
use crate::source::Dataflow;
use std::sync::{Arc, OnceLock};
use tracing_subscriber::EnvFilter;

/// A process-wide work-stealing pool with four workers.
///
/// Shared so that no test ever drops a runtime from inside another.
///
/// # Panics
///
/// Panics if the runtime cannot be built.
#[must_use]
pub fn test_pool() -> Arc<dyn WorkerPool> {
    static POOL: OnceLock<Arc<dyn WorkerPool>> = OnceLock::new();
    Arc::clone(POOL.get_or_init(|| {
        let config = PoolConfig::new()
            .with_worker_threads(4)
            .with_thread_name("laneflow-test");
        match TokioPool::new(&config) {
            Ok(pool) => Arc::new(pool),
            Err(e) => panic!("failed to build test pool: {e}"),
        }
    }))
}

/// A dataflow on [`test_pool`].
#[must_use]
pub fn test_dataflow() -> Dataflow {
    init_test_tracing();
    Dataflow::new(test_pool())
}

/// A dataflow on a fresh non-reentrant pool with `size` threads.
///
/// # Panics
///
/// Panics if the pool cannot be built.
#[must_use]
pub fn fixed_dataflow(size: usize) -> Dataflow {
    init_test_tracing();
    match FixedPool::with_size(size) {
        Ok(pool) => Dataflow::new(Arc::new(pool)),
        Err(e) => panic!("failed to build fixed pool: {e}"),
    }
}

/// Installs a test-writer subscriber filtered by `RUST_LOG`. Safe to call
/// repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("laneflow=warn")),
        )
        .with_test_writer()
        .try_init();
}
