//! Mock collaborators for dataflow tests.

use crate::errors::LaneError;
use crate::pipeline::ErrorHandler;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

/// An error handler that records every cause it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingHandler {
    seen: Arc<Mutex<Vec<LaneError>>>,
}

impl RecordingHandler {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A closure for [`Stage::capture`](crate::pipeline::Stage::capture).
    pub fn callback(&self) -> impl Fn(&LaneError) + Send + Sync + 'static {
        let seen = Arc::clone(&self.seen);
        move |err: &LaneError| seen.lock().push(err.clone())
    }

    /// The same recorder as a shared [`ErrorHandler`].
    #[must_use]
    pub fn handler(&self) -> ErrorHandler {
        Arc::new(self.callback())
    }

    /// Number of causes received.
    #[must_use]
    pub fn count(&self) -> usize {
        self.seen.lock().len()
    }

    /// Display strings of the causes received, in order.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.seen.lock().iter().map(ToString::to_string).collect()
    }

    /// The causes received, in order.
    #[must_use]
    pub fn errors(&self) -> Vec<LaneError> {
        self.seen.lock().clone()
    }
}

/// A latch that holds lane work until the test opens it.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl Gate {
    /// Creates a closed gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the gate is opened.
    pub fn wait(&self) {
        let (open, signal) = &*self.state;
        let mut open = open.lock();
        while !*open {
            signal.wait(&mut open);
        }
    }

    /// Opens the gate, releasing every waiter.
    pub fn open(&self) {
        let (open, signal) = &*self.state;
        *open.lock() = true;
        signal.notify_all();
    }

    /// Returns true once the gate has been opened.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.state.0.lock()
    }
}
