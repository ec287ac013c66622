//! Run handle and termination reporting.

use crate::cancellation::{CancelCause, CancelScope, TaskGroup};
use crate::stream::StreamReceiver;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// How a run terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The source exhausted and every unit drained and exited.
    Completed,
    /// The scope was tripped explicitly.
    Cancelled,
    /// The scope's deadline elapsed.
    DeadlineExceeded,
}

impl RunOutcome {
    /// Returns true if the run completed naturally.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if the run was cancelled or timed out.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::DeadlineExceeded => write!(f, "deadline_exceeded"),
        }
    }
}

/// One-shot termination report for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique id of the run.
    pub run_id: Uuid,
    /// When the run was started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: f64,
    /// How the run terminated.
    pub outcome: RunOutcome,
    /// The cancellation reason, for explicitly cancelled runs.
    pub cancel_reason: Option<String>,
}

/// A running pipeline.
///
/// The caller drains the terminal stream through [`recv`](Self::recv), may
/// trip cancellation at any point, and finishes with [`wait`](Self::wait),
/// which returns only after every spawned unit has actually exited -
/// cancellation signals intent, it never force-kills a unit.
#[derive(Debug)]
pub struct PipelineRun<T> {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    started: Instant,
    output: Option<StreamReceiver<T>>,
    group: Arc<TaskGroup>,
}

impl<T> PipelineRun<T> {
    pub(crate) fn new(output: StreamReceiver<T>, group: Arc<TaskGroup>) -> Self {
        let run_id = Uuid::new_v4();
        debug!(%run_id, units = group.task_count(), "pipeline run started");
        Self {
            run_id,
            started_at: Utc::now(),
            started: Instant::now(),
            output: Some(output),
            group,
        }
    }

    /// Returns the unique id of this run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns when this run started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the run's cancellation scope.
    #[must_use]
    pub fn scope(&self) -> &Arc<CancelScope> {
        self.group.scope()
    }

    /// Trips the run's cancellation scope.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.group.cancel_all(reason);
    }

    /// Pops the next result item; `None` once the terminal stream closes.
    ///
    /// Under cancellation the stream still closes, but with zero guarantee
    /// of item count - in-flight items may be lost, by design.
    pub async fn recv(&mut self) -> Option<T> {
        match self.output.as_mut() {
            Some(output) => output.recv().await,
            None => None,
        }
    }

    /// Drains the terminal stream to exhaustion.
    pub async fn drain(&mut self) -> Vec<T> {
        let mut items = Vec::new();
        while let Some(item) = self.recv().await {
            items.push(item);
        }
        items
    }

    /// Waits for every spawned unit to exit and reports how the run ended.
    ///
    /// The terminal stream is released first, so producers still blocked on
    /// a full stream can unwind even if the caller stopped consuming early.
    pub async fn wait(mut self) -> RunSummary {
        drop(self.output.take());
        self.group.wait().await;

        let (outcome, cancel_reason) = match self.group.scope().err() {
            None => (RunOutcome::Completed, None),
            Some(CancelCause::Cancelled(reason)) => (RunOutcome::Cancelled, Some(reason)),
            Some(CancelCause::DeadlineExceeded) => (RunOutcome::DeadlineExceeded, None),
        };
        let summary = RunSummary {
            run_id: self.run_id,
            started_at: self.started_at,
            duration_ms: self.started.elapsed().as_secs_f64() * 1000.0,
            outcome,
            cancel_reason,
        };
        info!(run_id = %summary.run_id, outcome = %summary.outcome, "pipeline run finished");
        summary
    }
}
