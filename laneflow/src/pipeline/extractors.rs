//! Strategies for picking one value out of a collected sequence.
//!
//! Any `FnOnce(Vec<T>) -> Result<R, PipelineError>` can be passed to
//! [`Stage::block_and_extract`](super::Stage::block_and_extract); these are the
//! built-in ones.

use crate::errors::PipelineError;

/// Returns the earliest-index kept value.
///
/// Paired with a breakout after the second completion this is the first
/// result only when lanes resolve in index order.
pub fn first<T>(values: Vec<T>) -> Result<T, PipelineError> {
    values.into_iter().next().ok_or(PipelineError::EmptyResult)
}

/// Returns the final kept value.
pub fn last<T>(mut values: Vec<T>) -> Result<T, PipelineError> {
    values.pop().ok_or(PipelineError::EmptyResult)
}
