//! Typed pipeline builder.

use super::run::PipelineRun;
use super::stage::spawn_stage;
use crate::cancellation::{CancelScope, TaskGroup};
use crate::errors::{FlowlineError, TaskError};
use crate::fanout::split;
use crate::merge::merge;
use crate::pool::{spawn_pool, TaskOutcome};
use crate::source::{spawn_source, Source};
use crate::stream::{StreamReceiver, DEFAULT_CAPACITY};
use std::sync::Arc;
use std::time::Duration;

/// Builder for a single pipeline run.
///
/// A run wires Source -> Stage(s) -> optional parallel block -> sink, shares
/// one cancellation scope across every unit, and is discarded after
/// termination; builders are not reusable either.
#[derive(Debug)]
pub struct PipelineBuilder {
    scope: Arc<CancelScope>,
    capacity: usize,
}

impl PipelineBuilder {
    /// Creates a builder whose run has no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scope: CancelScope::new(),
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Creates a builder whose run is cancelled after `deadline`.
    #[must_use]
    pub fn with_deadline(deadline: Duration) -> Self {
        Self {
            scope: CancelScope::with_deadline(deadline),
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Creates a builder around a caller-owned scope, e.g. one shared with
    /// an external cancel trigger.
    #[must_use]
    pub fn with_scope(scope: Arc<CancelScope>) -> Self {
        Self {
            scope,
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Sets the capacity of every stream wired by this builder.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Starts the pipeline from a source, spawning its unit immediately.
    pub fn source<T, S>(self, source: S) -> Pipeline<T>
    where
        T: Send + 'static,
        S: Source<T> + 'static,
    {
        let group = Arc::new(TaskGroup::new(self.scope));
        let output = spawn_source(source, self.capacity, &group);
        Pipeline {
            group,
            capacity: self.capacity,
            output,
        }
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A pipeline under construction, typed by the items its tail produces.
///
/// Each composition step spawns the corresponding units immediately; items
/// start flowing as soon as the source is attached.
#[derive(Debug)]
pub struct Pipeline<T> {
    group: Arc<TaskGroup>,
    capacity: usize,
    output: StreamReceiver<T>,
}

impl<T: Send + 'static> Pipeline<T> {
    /// Appends a one-to-one transformation stage.
    #[must_use]
    pub fn stage<U, F>(self, task: F) -> Pipeline<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + 'static,
    {
        let output = spawn_stage(self.output, task, self.capacity, &self.group);
        Pipeline {
            group: self.group,
            capacity: self.capacity,
            output,
        }
    }

    /// Appends a worker pool: `worker_count` symmetric workers pulling from
    /// one shared queue, emitting tagged outcomes.
    ///
    /// End-to-end ordering is forfeited past this point, by design.
    ///
    /// # Errors
    ///
    /// Returns [`FlowlineError::InvalidWorkerCount`] if `worker_count` is
    /// zero; no unit is spawned in that case.
    pub fn pooled<U, F>(
        self,
        worker_count: usize,
        task: F,
    ) -> Result<Pipeline<TaskOutcome<U>>, FlowlineError>
    where
        U: Send + 'static,
        F: Fn(T) -> Result<U, TaskError> + Send + Sync + 'static,
    {
        let Self {
            group,
            capacity,
            output,
        } = self;
        let output = spawn_pool(output, task, worker_count, capacity, &group)?;
        Ok(Pipeline {
            group,
            capacity,
            output,
        })
    }

    /// Appends a fan-out block: a distributor splitting the stream across
    /// `branches` dedicated workers, and a merger recombining their tagged
    /// outcomes into one stream.
    ///
    /// End-to-end ordering is forfeited past this point, by design.
    ///
    /// # Errors
    ///
    /// Returns [`FlowlineError::InvalidFanOut`] if `branches` is zero; no
    /// unit is spawned in that case.
    pub fn fan_out<U, F>(
        self,
        branches: usize,
        task: F,
    ) -> Result<Pipeline<TaskOutcome<U>>, FlowlineError>
    where
        U: Send + 'static,
        F: Fn(T) -> Result<U, TaskError> + Send + Sync + 'static,
    {
        let Self {
            group,
            capacity,
            output,
        } = self;
        let parts = split(output, branches, capacity, &group)?;

        let task = Arc::new(task);
        let mut outputs = Vec::with_capacity(branches);
        for part in parts {
            let task = Arc::clone(&task);
            let branch = spawn_pool(part, move |item| (task)(item), 1, capacity, &group)?;
            outputs.push(branch);
        }
        let output = merge(outputs, capacity, &group);
        Ok(Pipeline {
            group,
            capacity,
            output,
        })
    }

    /// Returns the run's cancellation scope.
    #[must_use]
    pub fn scope(&self) -> &Arc<CancelScope> {
        self.group.scope()
    }

    /// Finishes wiring and hands back the run handle owning the lifecycle.
    #[must_use]
    pub fn run(self) -> PipelineRun<T> {
        PipelineRun::new(self.output, self.group)
    }
}
