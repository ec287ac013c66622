//! Error types for the flowline engine.
//!
//! Three families, kept deliberately separate:
//!
//! - Cancellation (`Cancelled`, `DeadlineExceeded`) is a terminal signal for
//!   a whole run, reported exactly once.
//! - Task failures ([`TaskError`]) are data: they travel through the output
//!   stream attached to their item and never stop a worker or pool.
//! - Structural misuse (`InvalidWorkerCount`, `InvalidFanOut`) is rejected
//!   synchronously at setup time, before any unit is spawned.

use crate::cancellation::CancelCause;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for flowline operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowlineError {
    /// The run's cancellation scope was tripped explicitly.
    #[error("pipeline cancelled: {0}")]
    Cancelled(String),

    /// The run's deadline elapsed before completion.
    #[error("pipeline deadline exceeded")]
    DeadlineExceeded,

    /// A worker pool was requested with zero workers.
    #[error("worker pool requires at least one worker")]
    InvalidWorkerCount,

    /// A fan-out was requested with zero output streams.
    #[error("fan-out requires at least one output stream")]
    InvalidFanOut,
}

impl From<CancelCause> for FlowlineError {
    fn from(cause: CancelCause) -> Self {
        match cause {
            CancelCause::Cancelled(reason) => Self::Cancelled(reason),
            CancelCause::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

/// A failure raised by a caller-supplied task for a single item.
///
/// Task errors are carried alongside their item as a tagged result; they do
/// not abort the worker, the pool, or the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("task failed: {message}")]
pub struct TaskError {
    /// Human-readable description of the failure.
    pub message: String,
}

impl TaskError {
    /// Creates a new task error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
