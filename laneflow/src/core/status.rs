//! Progress snapshot for blocking collection.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How far a blocking collection has got.
///
/// Recomputed after every lane the caller has awaited and handed to the
/// breakout predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Status {
    /// Number of lanes in the stage being collected.
    pub total: usize,
    /// Number of lanes awaited so far, whatever their outcome.
    pub completed: usize,
}

impl Status {
    /// Creates a new status snapshot.
    #[must_use]
    pub const fn new(total: usize, completed: usize) -> Self {
        Self { total, completed }
    }

    /// Number of lanes not yet awaited.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.total.saturating_sub(self.completed)
    }

    /// Returns true once every lane has been awaited.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.completed >= self.total
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.completed, self.total)
    }
}
