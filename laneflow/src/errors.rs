//! Error types for the laneflow engine.
//!
//! Two families live here. [`LaneError`] is the cause carried by a single lane
//! that failed; it flows through the dataflow as data and is only ever observed
//! by recovery functions and error handlers. [`PipelineError`] is what the
//! calling thread sees when the infrastructure itself gives out: an interrupted
//! lane, a refused submission, a panicking submitted task, an empty extraction.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// The main error type for laneflow operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A lane was dropped by its worker pool before it resolved.
    #[error("Lane {lane} was interrupted before it resolved: {source}")]
    Interrupted {
        /// Index of the lane being awaited.
        lane: usize,
        /// The interruption cause reported by the lane.
        source: LaneError,
    },

    /// Work could not be handed to the worker pool.
    #[error("Submission error: {0}")]
    Submission(String),

    /// Submitted work failed while running.
    #[error("Execution error: {0}")]
    Execution(String),

    /// An extractor was applied to a sequence with no kept values.
    #[error("Empty result: no lane produced a value")]
    EmptyResult,

    /// Invalid pool configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error while building a worker pool.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Returns true if this error reports an interrupted lane.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }
}

/// How a lane came to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneErrorKind {
    /// User code returned an error.
    Failed,
    /// User code panicked on the worker pool.
    Panicked,
    /// The lane's task was dropped before it produced an outcome.
    Interrupted,
}

impl fmt::Display for LaneErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed => write!(f, "failed"),
            Self::Panicked => write!(f, "panicked"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// The cause of a failed lane.
///
/// Cloning is cheap: the original error is shared, so every observer of a
/// resolved lane sees the same cause. Use [`LaneError::downcast_ref`] to get
/// back the concrete error the user code produced.
#[derive(Clone)]
pub struct LaneError {
    kind: LaneErrorKind,
    inner: Arc<anyhow::Error>,
}

impl LaneError {
    /// Wraps a user error.
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self {
            kind: LaneErrorKind::Failed,
            inner: Arc::new(error.into()),
        }
    }

    /// Creates a failure from a plain message.
    pub fn msg(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self::new(anyhow::Error::msg(message))
    }

    /// Converts a panic payload caught on the worker pool.
    #[must_use]
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self {
            kind: LaneErrorKind::Panicked,
            inner: Arc::new(anyhow::anyhow!("lane panicked: {}", panic_message(&*payload))),
        }
    }

    /// The cause reported by a lane whose task never produced an outcome.
    #[must_use]
    pub fn interrupted() -> Self {
        Self {
            kind: LaneErrorKind::Interrupted,
            inner: Arc::new(anyhow::anyhow!("lane task was dropped before completion")),
        }
    }

    /// Returns how the lane failed.
    #[must_use]
    pub fn kind(&self) -> LaneErrorKind {
        self.kind
    }

    /// Returns true if the lane was interrupted rather than failed by user code.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.kind == LaneErrorKind::Interrupted
    }

    /// Returns the original error if it is of type `E`.
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.inner.downcast_ref::<E>()
    }

    /// Borrows the underlying error.
    #[must_use]
    pub fn as_anyhow(&self) -> &anyhow::Error {
        &self.inner
    }
}

impl fmt::Debug for LaneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaneError")
            .field("kind", &self.kind)
            .field("cause", &format_args!("{:#}", self.inner))
            .finish()
    }
}

impl fmt::Display for LaneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

impl std::error::Error for LaneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
