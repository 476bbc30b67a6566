//! Testing utilities for laneflow dataflows.
//!
//! This module provides:
//! - Shared pools and dataflows for tests
//! - A recording error handler
//! - Assertions over stages

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_blocks_to, assert_lane_count};
pub use fixtures::{fixed_dataflow, init_test_tracing, test_dataflow, test_pool};
pub use mocks::{Gate, RecordingHandler};
