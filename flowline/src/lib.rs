//! # Flowline
//!
//! Concurrent pipeline and worker-pool processing primitives.
//!
//! Flowline moves a stream of work items through an ordered sequence of
//! transformation stages, optionally spreads items across parallel workers
//! and recombines their outputs, and supports cooperative cancellation that
//! reaches every in-flight unit:
//!
//! - **Sources**: lazy, single-pass item producers
//! - **Stages**: one-to-one transformations composed into pipelines
//! - **Fan-out / fan-in**: availability-based distribution and exact-once merging
//! - **Worker pools**: symmetric executors over a shared input stream
//! - **Cancellation scopes**: one-way, idempotent cancel/deadline signals
//!
//! ## Quick Start
//!
//! ```rust
//! use flowline::prelude::*;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let mut run = PipelineBuilder::new()
//!     .source(IterSource::new(1..=5))
//!     .stage(|n: i64| n * 2)
//!     .stage(|n: i64| n * n)
//!     .run();
//!
//! while let Some(n) = run.recv().await {
//!     println!("{n}");
//! }
//!
//! let summary = run.wait().await;
//! assert!(summary.outcome.is_completed());
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod errors;
pub mod fanout;
pub mod merge;
pub mod pipeline;
pub mod pool;
pub mod source;
pub mod stream;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::{CancelCause, CancelScope, TaskGroup};
    pub use crate::errors::{FlowlineError, TaskError};
    pub use crate::fanout::split;
    pub use crate::merge::merge;
    pub use crate::pipeline::{
        spawn_stage, Pipeline, PipelineBuilder, PipelineRun, RunOutcome, RunSummary,
    };
    pub use crate::pool::{spawn_pool, TaskOutcome};
    pub use crate::source::{spawn_source, IterSource, Source};
    pub use crate::stream::{stream, SharedReceiver, StreamReceiver, StreamSender};
}
