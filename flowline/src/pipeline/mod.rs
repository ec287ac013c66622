//! Pipeline composition and execution.
//!
//! This module provides:
//! - One-to-one stage units
//! - A typed builder chaining stages, pools, and fan-out blocks
//! - The run handle that owns the completion/cancellation lifecycle

mod builder;
mod run;
mod stage;


pub use builder::{Pipeline, PipelineBuilder};
pub use run::{PipelineRun, RunOutcome, RunSummary};
pub use stage::spawn_stage;
