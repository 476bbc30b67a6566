//! Blocking collection with breakout.
//!
//! The calling thread awaits lanes one at a time, in lane order, and asks the
//! breakout predicate after each one whether it has seen enough. Lanes past
//! the breakout point are left running; nothing is cancelled.

use super::lane::{Lane, LaneValue};
use crate::core::{kept_values, Outcome, Slot, Status};
use crate::errors::{LaneError, PipelineError};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Receives the cause of every unrecoverable lane failure a collection observes.
pub type ErrorHandler = Arc<dyn Fn(&LaneError) + Send + Sync>;

/// The handler stages start with: logs the failure.
#[must_use]
pub fn default_error_handler() -> ErrorHandler {
    Arc::new(|err: &LaneError| {
        error!(kind = %err.kind(), error = %err, "Unrecoverable lane failure");
    })
}

/// Collects the kept values of a lane set.
pub(crate) struct Blocker<T: LaneValue> {
    lanes: Vec<Lane<T>>,
    error_handler: Option<ErrorHandler>,
}

impl<T: LaneValue> Blocker<T> {
    pub(crate) fn new(lanes: Vec<Lane<T>>, error_handler: Option<ErrorHandler>) -> Self {
        Self {
            lanes,
            error_handler,
        }
    }

    /// Blocks until every lane has resolved or `breakout` returns true.
    ///
    /// Filtered lanes are dropped silently. Failed lanes are reported to the
    /// error handler once, then dropped. An interrupted lane is reported too,
    /// and then ends the collection with [`PipelineError::Interrupted`].
    pub(crate) fn block<B>(&self, breakout: B) -> Result<Vec<T>, PipelineError>
    where
        B: Fn(&Status) -> bool,
    {
        let total = self.lanes.len();
        let mut slots = Vec::with_capacity(total);

        for (index, lane) in self.lanes.iter().enumerate() {
            let outcome = lane.wait();
            if let Outcome::Failed(err) = &outcome {
                self.capture(err);
                if err.is_interrupted() {
                    warn!(lane = index, total, "Lane interrupted while blocking");
                    return Err(PipelineError::Interrupted {
                        lane: index,
                        source: err.clone(),
                    });
                }
            }
            slots.push(outcome.into_slot());

            let status = Status::new(total, index + 1);
            if breakout(&status) {
                debug!(%status, "Breakout condition met, leaving remaining lanes unobserved");
                break;
            }
        }

        Ok(kept_values(slots).collect())
    }

    fn capture(&self, err: &LaneError) {
        report(self.error_handler.as_ref(), err);
    }
}

/// Awaits every lane without blocking a thread, reporting failures as the
/// blocking path does.
///
/// An interrupted lane is returned as the error instead of being reported, so
/// that whoever later blocks on the aggregate sees it exactly once.
pub(crate) async fn gather<T: LaneValue>(
    lanes: &[Lane<T>],
    error_handler: Option<&ErrorHandler>,
) -> Result<Vec<T>, LaneError> {
    let mut slots = Vec::with_capacity(lanes.len());
    for lane in lanes {
        let slot = match lane.outcome().await {
            Outcome::Failed(err) if err.is_interrupted() => return Err(err),
            Outcome::Failed(err) => {
                report(error_handler, &err);
                Slot::Missing
            }
            outcome => outcome.into_slot(),
        };
        slots.push(slot);
    }
    Ok(kept_values(slots).collect())
}

fn report(handler: Option<&ErrorHandler>, err: &LaneError) {
    if let Some(handler) = handler {
        handler(err);
    }
}
