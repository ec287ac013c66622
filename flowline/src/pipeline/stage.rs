//! One-to-one pipeline stages.

use crate::cancellation::{CancelScope, TaskGroup};
use crate::stream::{stream, StreamReceiver, StreamSender};
use std::sync::Arc;
use tracing::debug;

/// Spawns a stage unit applying `task` to every item of `input`.
///
/// Strictly one-to-one: every input item yields exactly one output item, in
/// input order; no filtering or batching happens in this primitive. The
/// stage closes its output only after its input is exhausted or the scope
/// trips - never eagerly.
pub fn spawn_stage<T, U, F>(
    input: StreamReceiver<T>,
    task: F,
    capacity: usize,
    group: &TaskGroup,
) -> StreamReceiver<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> U + Send + 'static,
{
    let (tx, rx) = stream(capacity);
    let scope = group.scope().clone();
    group.spawn("stage", run_stage(input, tx, task, scope));
    rx
}

async fn run_stage<T, U, F>(
    mut input: StreamReceiver<T>,
    output: StreamSender<U>,
    task: F,
    scope: Arc<CancelScope>,
) where
    T: Send,
    U: Send,
    F: Fn(T) -> U + Send,
{
    loop {
        let item = tokio::select! {
            item = input.recv() => match item {
                Some(item) => item,
                None => break,
            },
            () = scope.cancelled() => break,
        };
        let mapped = task(item);
        tokio::select! {
            sent = output.send(mapped) => {
                if sent.is_err() {
                    break;
                }
            }
            () = scope.cancelled() => break,
        }
    }
    debug!("stage exited");
}
