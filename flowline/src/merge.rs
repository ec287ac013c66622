//! Fan-in: combining several streams into one.

use crate::cancellation::{CancelScope, TaskGroup};
use crate::stream::{stream, StreamReceiver, StreamSender};
use std::sync::Arc;
use tracing::debug;

/// Merges `inputs` into a single output stream.
///
/// Every item from every input is forwarded exactly once. Items from the
/// same input keep their relative order; interleaving across inputs is
/// unspecified. The output closes exactly once, only after every input has
/// closed and drained: each forwarder owns one clone of the output sender,
/// and the stream closes when the last forwarder exits.
pub fn merge<T>(
    inputs: Vec<StreamReceiver<T>>,
    capacity: usize,
    group: &TaskGroup,
) -> StreamReceiver<T>
where
    T: Send + 'static,
{
    let (tx, rx) = stream(capacity);
    for (index, input) in inputs.into_iter().enumerate() {
        let scope = group.scope().clone();
        group.spawn(format!("merge-{index}"), forward(index, input, tx.clone(), scope));
    }
    // The forwarders now hold the only senders; the last one out closes.
    drop(tx);
    rx
}

async fn forward<T: Send>(
    index: usize,
    mut input: StreamReceiver<T>,
    output: StreamSender<T>,
    scope: Arc<CancelScope>,
) {
    loop {
        let item = tokio::select! {
            item = input.recv() => match item {
                Some(item) => item,
                None => break,
            },
            () = scope.cancelled() => break,
        };
        tokio::select! {
            sent = output.send(item) => {
                if sent.is_err() {
                    break;
                }
            }
            () = scope.cancelled() => break,
        }
    }
    debug!(forwarder = index, "merge forwarder exited");
}
