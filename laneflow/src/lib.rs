//! # Laneflow
//!
//! A fluent, immutable builder for concurrent dataflows on a shared worker pool.
//!
//! Laneflow tracks a fixed, ordered set of independent computations ("lanes")
//! and lets you describe what happens to each of them:
//!
//! - **Per-lane transformations**: `then`, `peek`, `filter` and `on_fail` add a
//!   step to every lane without blocking
//! - **Error capture**: unrecoverable failures reach a handler when a blocking
//!   or aggregating call observes them
//! - **Barriers**: `all_of` collapses every lane into one aggregate lane
//! - **Breakout collection**: block lane by lane until a predicate has seen enough
//! - **Pool submission**: run a reduction on the pool so nested parallel work
//!   reuses its threads
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use laneflow::prelude::*;
//!
//! let dataflow = Dataflow::from_config(&PoolConfig::default())?;
//!
//! let values = dataflow
//!     .react((1..=3).map(|i| move || i))
//!     .then(|it| it * 100)
//!     .filter(|it| *it > 150)
//!     .block()?;
//!
//! assert_eq!(values, vec![200, 300]);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod core;
pub mod errors;
pub mod pipeline;
pub mod pool;
pub mod source;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{Outcome, Slot, Status};
    pub use crate::errors::{LaneError, LaneErrorKind, PipelineError};
    pub use crate::pipeline::extractors;
    pub use crate::pipeline::{
        default_error_handler, ErrorHandler, Lane, LaneHandle, LaneValue, ResultCollector,
        Stage,
    };
    pub use crate::pool::{FixedPool, PoolConfig, PoolKind, TokioPool, WorkerPool};
    pub use crate::source::Dataflow;
}
