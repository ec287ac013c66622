//! Cooperative cancellation for pipeline runs.
//!
//! This module provides:
//! - `CancelScope` for one-way, idempotent cancel and deadline signals
//! - `TaskGroup` for tracking spawned units and awaiting their exit

mod scope;
mod task_group;

pub use scope::{CancelCause, CancelScope};
pub use task_group::TaskGroup;
