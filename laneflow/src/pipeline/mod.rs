//! The dataflow engine.
//!
//! This module provides:
//! - Lanes, the single asynchronously resolved units of work
//! - The immutable stage builder and its transformations
//! - Blocking collection with breakout
//! - Extractors and two-phase result collection

mod blocker;
mod collector;
pub mod extractors;
mod lane;
mod stage;


pub use blocker::{default_error_handler, ErrorHandler};
pub use collector::ResultCollector;
pub use lane::{Lane, LaneHandle, LaneValue};
pub use stage::Stage;
