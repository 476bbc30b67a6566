//! Core domain model types for laneflow.
//!
//! This module contains the values that flow between lanes and blocking calls:
//! - Lane outcomes (value, filtered, failed)
//! - Collection slots (present or missing)
//! - Blocking status snapshots handed to breakout predicates

mod outcome;
mod status;

pub(crate) use outcome::kept_values;
pub use outcome::{Outcome, Slot};
pub use status::Status;
