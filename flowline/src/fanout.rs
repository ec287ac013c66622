//! Fan-out: distributing one stream across several.

use crate::cancellation::{CancelScope, TaskGroup};
use crate::errors::FlowlineError;
use crate::stream::{stream, StreamReceiver, StreamSender};
use futures::future::select_all;
use std::sync::Arc;
use tracing::debug;

/// Splits `input` into `n` output streams.
///
/// Items are offered to whichever output currently has a free slot - the
/// first stream ready to accept wins - which avoids head-of-line blocking
/// when downstream consumers have uneven processing times. Known limitation:
/// the policy is not globally fair under sustained imbalance; a chronically
/// slow consumer may starve.
///
/// All outputs close exactly once, when the distributor exits (input
/// exhausted, cancellation, or every consumer gone); no item is delivered
/// after closing begins.
///
/// # Errors
///
/// Returns [`FlowlineError::InvalidFanOut`] if `n` is zero. Rejected before
/// any unit is spawned.
pub fn split<T>(
    input: StreamReceiver<T>,
    n: usize,
    capacity: usize,
    group: &TaskGroup,
) -> Result<Vec<StreamReceiver<T>>, FlowlineError>
where
    T: Send + 'static,
{
    if n == 0 {
        return Err(FlowlineError::InvalidFanOut);
    }

    let mut senders = Vec::with_capacity(n);
    let mut receivers = Vec::with_capacity(n);
    for _ in 0..n {
        let (tx, rx) = stream(capacity);
        senders.push(tx);
        receivers.push(rx);
    }

    let scope = group.scope().clone();
    group.spawn("distributor", distribute(input, senders, scope));
    Ok(receivers)
}

async fn distribute<T: Send>(
    mut input: StreamReceiver<T>,
    mut outputs: Vec<StreamSender<T>>,
    scope: Arc<CancelScope>,
) {
    'pump: loop {
        let item = tokio::select! {
            item = input.recv() => match item {
                Some(item) => item,
                None => break 'pump,
            },
            () = scope.cancelled() => break 'pump,
        };

        // Offer the item until some output takes it. Outputs whose consumer
        // has gone away are dropped from the rotation.
        let mut slot = Some(item);
        while slot.is_some() {
            if outputs.is_empty() {
                break 'pump;
            }
            let offers: Vec<_> = outputs.iter().map(|out| Box::pin(out.reserve())).collect();
            let dead = tokio::select! {
                (reserved, index, _) = select_all(offers) => match reserved {
                    Ok(permit) => {
                        if let Some(item) = slot.take() {
                            permit.send(item);
                        }
                        None
                    }
                    Err(_) => Some(index),
                },
                () = scope.cancelled() => break 'pump,
            };
            if let Some(index) = dead {
                drop(outputs.remove(index));
            }
        }
    }
    debug!(outputs = outputs.len(), "distributor exited");
}
