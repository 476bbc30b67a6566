//! Test assertions for stages.

use crate::pipeline::{LaneValue, Stage};
use std::fmt::Debug;

/// Asserts that the stage has the expected number of lanes.
pub fn assert_lane_count<T: LaneValue, R>(stage: &Stage<T, R>, expected: usize) {
    assert_eq!(
        stage.lane_count(),
        expected,
        "Expected {} lanes, got {}",
        expected,
        stage.lane_count()
    );
}

/// Asserts that blocking on the stage yields exactly `expected`.
pub fn assert_blocks_to<T, R>(stage: &Stage<T, R>, expected: &[T])
where
    T: LaneValue + PartialEq + Debug,
{
    match stage.block() {
        Ok(values) => assert_eq!(values, expected, "Blocked values did not match"),
        Err(e) => panic!("Expected values {expected:?}, block failed: {e}"),
    }
}
