//! Worker pools: symmetric executors over a shared input stream.

use crate::cancellation::{CancelScope, TaskGroup};
use crate::errors::{FlowlineError, TaskError};
use crate::stream::{stream, SharedReceiver, StreamReceiver, StreamSender};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// The tagged result of running one item through a pool worker.
///
/// Errors are data, not control flow, at this layer: a failed task produces
/// a `Failed` outcome and the worker keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome<T> {
    /// The task completed and produced a value.
    Done(T),
    /// The task failed for this item; the error travels with it.
    Failed(TaskError),
    /// The scope had already tripped when the worker was about to start the
    /// task; the task was skipped.
    Cancelled,
}

impl<T> TaskOutcome<T> {
    /// Returns the value if the task completed.
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Done(value) => Some(value),
            Self::Failed(_) | Self::Cancelled => None,
        }
    }

    /// Returns true if the task completed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// Returns true if the task failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns true if the task was skipped due to cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Spawns `worker_count` symmetric workers over `input`.
///
/// Each worker loops: pull one item from the shared input (waiting if
/// empty), apply `task`, push the tagged outcome to the shared output
/// (waiting if full). A worker exits when the input is exhausted or the
/// scope trips, whichever comes first. The output closes exactly once,
/// after **every** worker has exited: each worker owns one sender clone and
/// the stream closes on the last drop.
///
/// # Errors
///
/// Returns [`FlowlineError::InvalidWorkerCount`] if `worker_count` is zero.
/// Rejected before any unit is spawned.
pub fn spawn_pool<T, U, F>(
    input: StreamReceiver<T>,
    task: F,
    worker_count: usize,
    capacity: usize,
    group: &TaskGroup,
) -> Result<StreamReceiver<TaskOutcome<U>>, FlowlineError>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> Result<U, TaskError> + Send + Sync + 'static,
{
    if worker_count == 0 {
        return Err(FlowlineError::InvalidWorkerCount);
    }

    let (tx, rx) = stream(capacity);
    let shared = input.into_shared();
    let task = Arc::new(task);
    for worker in 0..worker_count {
        let scope = group.scope().clone();
        group.spawn(
            format!("worker-{worker}"),
            run_worker(worker, shared.clone(), tx.clone(), task.clone(), scope),
        );
    }
    drop(tx);
    Ok(rx)
}

async fn run_worker<T, U, F>(
    worker: usize,
    input: SharedReceiver<T>,
    output: StreamSender<TaskOutcome<U>>,
    task: Arc<F>,
    scope: Arc<CancelScope>,
) where
    T: Send,
    U: Send,
    F: Fn(T) -> Result<U, TaskError> + Send + Sync,
{
    loop {
        // Biased so that a ready item wins a race with a concurrent trip;
        // the skip below is then observable as a tagged outcome.
        let item = tokio::select! {
            biased;
            item = input.recv() => match item {
                Some(item) => item,
                None => break,
            },
            () = scope.cancelled() => break,
        };

        // A scope tripped before the task starts means the task is skipped
        // and a cancellation-tagged outcome emitted, best-effort.
        if scope.is_cancelled() {
            drop(item);
            let _ = output.try_send(TaskOutcome::Cancelled);
            break;
        }

        let outcome = match task(item) {
            Ok(value) => TaskOutcome::Done(value),
            Err(error) => TaskOutcome::Failed(error),
        };
        tokio::select! {
            sent = output.send(outcome) => {
                if sent.is_err() {
                    break;
                }
            }
            () = scope.cancelled() => break,
        }
    }
    debug!(worker, "pool worker exited");
}
