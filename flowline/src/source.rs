//! Sources: lazy, single-pass producers of items.

use crate::cancellation::{CancelScope, TaskGroup};
use crate::stream::{stream, StreamReceiver, StreamSender};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// A lazy producer of items.
///
/// `next` returning `None` signals exhaustion - terminal, not an error.
/// A source instance is single-pass; it is consumed by the run that pumps it.
/// The pump races `next` against the run's cancellation scope, so an item
/// still being produced when the scope trips may be dropped.
#[async_trait]
pub trait Source<T>: Send {
    /// Produces the next item, or `None` once exhausted.
    async fn next(&mut self) -> Option<T>;
}

/// A source backed by any iterator.
#[derive(Debug)]
pub struct IterSource<I> {
    iter: I,
}

impl<I: Iterator> IterSource<I> {
    /// Creates a source from anything iterable.
    pub fn new(items: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            iter: items.into_iter(),
        }
    }
}

#[async_trait]
impl<I> Source<I::Item> for IterSource<I>
where
    I: Iterator + Send,
    I::Item: Send,
{
    async fn next(&mut self) -> Option<I::Item> {
        self.iter.next()
    }
}

/// Spawns a unit that pumps `source` into a fresh stream.
///
/// The scope is checked before each production step; on exhaustion or
/// cancellation the output closes on every exit path (the sender is owned by
/// the unit and drops with it).
pub fn spawn_source<T, S>(source: S, capacity: usize, group: &TaskGroup) -> StreamReceiver<T>
where
    T: Send + 'static,
    S: Source<T> + 'static,
{
    let (tx, rx) = stream(capacity);
    let scope = group.scope().clone();
    group.spawn("source", run_source(source, tx, scope));
    rx
}

async fn run_source<T, S>(mut source: S, output: StreamSender<T>, scope: Arc<CancelScope>)
where
    T: Send,
    S: Source<T>,
{
    loop {
        if scope.is_cancelled() {
            break;
        }
        // A source suspended inside next() must still observe the trip.
        let item = tokio::select! {
            item = source.next() => match item {
                Some(item) => item,
                None => break,
            },
            () = scope.cancelled() => break,
        };
        tokio::select! {
            sent = output.send(item) => {
                if sent.is_err() {
                    // Downstream is gone
                    break;
                }
            }
            () = scope.cancelled() => break,
        }
    }
    debug!("source exited");
}
