//! Two-phase collection: block first, then reduce with `submit`.

use super::lane::LaneValue;
use super::stage::Stage;
use crate::core::Status;
use crate::errors::PipelineError;

/// Chooses how a stage's results are collected before further processing.
///
/// Each method blocks like its [`Stage`] counterpart and returns a stage over
/// the same lanes with the collected value cached, ready for
/// [`Stage::submit`].
///
/// ```rust,ignore
/// let total = stage
///     .collect_results()
///     .block()?
///     .submit(|results| results.map(|r| r.iter().sum::<i32>()).unwrap_or_default())?;
/// ```
#[derive(Debug, Clone)]
pub struct ResultCollector<T: LaneValue> {
    stage: Stage<T>,
}

impl<T: LaneValue> ResultCollector<T> {
    pub(crate) fn new(stage: Stage<T>) -> Self {
        Self { stage }
    }

    /// Blocks for every lane and caches the kept values.
    pub fn block(self) -> Result<Stage<T, Vec<T>>, PipelineError> {
        self.block_into_until(|_| false)
    }

    /// Blocks for every lane and caches the kept values gathered into `C`.
    pub fn block_into<C>(self) -> Result<Stage<T, C>, PipelineError>
    where
        C: FromIterator<T>,
    {
        self.block_into_until(|_| false)
    }

    /// Blocks until `breakout` holds and caches the kept values.
    pub fn block_until<B>(self, breakout: B) -> Result<Stage<T, Vec<T>>, PipelineError>
    where
        B: Fn(&Status) -> bool,
    {
        self.block_into_until(breakout)
    }

    /// Blocks until `breakout` holds and caches the kept values gathered into `C`.
    pub fn block_into_until<C, B>(self, breakout: B) -> Result<Stage<T, C>, PipelineError>
    where
        C: FromIterator<T>,
        B: Fn(&Status) -> bool,
    {
        let results: C = self.stage.block_into_until(breakout)?;
        Ok(self.stage.with_results(results))
    }
}
