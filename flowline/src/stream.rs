//! Bounded streams connecting pipeline units.
//!
//! A stream is an ordered, closable conduit of items: blocking push, blocking
//! pop, FIFO within the stream, and a one-way close. Closing is idempotent and
//! happens implicitly when the last sender is dropped, so the "last writer
//! closes" discipline used by pools and mergers falls out of sender ownership
//! rather than an explicit counter.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

/// Default capacity for streams created by pipeline builders.
pub const DEFAULT_CAPACITY: usize = 16;

/// Error returned when pushing to a stream whose consumer is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("stream closed")]
pub struct StreamClosed;

/// Error returned by [`StreamSender::try_send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TrySendError {
    /// The stream is at capacity.
    #[error("stream full")]
    Full,
    /// The consumer is gone.
    #[error("stream closed")]
    Closed,
}

/// Creates a bounded stream with the given capacity.
///
/// A zero capacity is clamped to one; streams are always able to hold at
/// least one in-flight item.
pub fn stream<T>(capacity: usize) -> (StreamSender<T>, StreamReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (StreamSender { inner: tx }, StreamReceiver { inner: rx })
}

/// The producing half of a stream.
///
/// Cloneable: fan-in and worker pools give each producing unit its own clone,
/// and the stream closes when the final clone drops.
#[derive(Debug)]
pub struct StreamSender<T> {
    inner: mpsc::Sender<T>,
}

impl<T> Clone for StreamSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> StreamSender<T> {
    /// Pushes an item, waiting for capacity.
    ///
    /// # Errors
    ///
    /// Returns [`StreamClosed`] if the receiving half has been dropped; the
    /// producer should treat this as a downstream shutdown and exit.
    pub async fn send(&self, item: T) -> Result<(), StreamClosed> {
        self.inner.send(item).await.map_err(|_| StreamClosed)
    }

    /// Pushes an item without waiting. Best-effort only.
    pub fn try_send(&self, item: T) -> Result<(), TrySendError> {
        self.inner.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TrySendError::Full,
            mpsc::error::TrySendError::Closed(_) => TrySendError::Closed,
        })
    }

    /// Waits for capacity and returns a permit holding one slot.
    ///
    /// The distributor races permits across all of its outputs so that the
    /// first stream with a free slot wins the item.
    pub async fn reserve(&self) -> Result<SendPermit<'_, T>, StreamClosed> {
        let permit = self.inner.reserve().await.map_err(|_| StreamClosed)?;
        Ok(SendPermit { inner: permit })
    }

    /// Returns true if the receiving half has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// A reserved slot in a stream; sending through it cannot block or fail.
#[derive(Debug)]
pub struct SendPermit<'a, T> {
    inner: mpsc::Permit<'a, T>,
}

impl<T> SendPermit<'_, T> {
    /// Delivers an item into the reserved slot.
    pub fn send(self, item: T) {
        self.inner.send(item);
    }
}

/// The consuming half of a stream.
#[derive(Debug)]
pub struct StreamReceiver<T> {
    inner: mpsc::Receiver<T>,
}

impl<T> StreamReceiver<T> {
    /// Pops the next item, waiting if the stream is empty.
    ///
    /// Returns `None` once the stream is closed **and** drained; exhaustion
    /// is terminal, not an error.
    pub async fn recv(&mut self) -> Option<T> {
        self.inner.recv().await
    }

    /// Converts this receiver into a multi-consumer handle for worker pools.
    #[must_use]
    pub fn into_shared(self) -> SharedReceiver<T> {
        SharedReceiver {
            inner: Arc::new(Mutex::new(self.inner)),
        }
    }
}

/// A cloneable, multi-consumer view of a stream's receiving half.
///
/// Workers in a pool contend on an async mutex for the next item; each item
/// is handed to exactly one worker.
#[derive(Debug)]
pub struct SharedReceiver<T> {
    inner: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for SharedReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SharedReceiver<T> {
    /// Pops the next item, waiting if the stream is empty.
    ///
    /// Returns `None` once the stream is closed and drained.
    pub async fn recv(&self) -> Option<T> {
        self.inner.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_within_stream() {
        let (tx, mut rx) = stream(4);
        for i in 0..4 {
            tx.send(i).await.unwrap();
        }
        drop(tx);

        let mut seen = Vec::new();
        while let Some(i) = rx.recv().await {
            seen.push(i);
        }
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_recv_none_after_close_and_drain() {
        let (tx, mut rx) = stream(1);
        tx.send(7).await.unwrap();
        drop(tx);

        assert_eq!(rx.recv().await, Some(7));
        assert_eq!(rx.recv().await, None);
        // Exhaustion is stable
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_send_fails_after_receiver_drop() {
        let (tx, rx) = stream(1);
        drop(rx);
        assert_eq!(tx.send(1).await, Err(StreamClosed));
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn test_try_send_full_and_closed() {
        let (tx, rx) = stream::<u32>(1);
        assert_eq!(tx.try_send(1), Ok(()));
        assert_eq!(tx.try_send(2), Err(TrySendError::Full));
        drop(rx);
        assert_eq!(tx.try_send(3), Err(TrySendError::Closed));
    }

    #[test]
    fn test_recv_pending_until_send() {
        let (tx, mut rx) = stream(1);
        let mut recv = tokio_test::task::spawn(rx.recv());
        tokio_test::assert_pending!(recv.poll());

        tx.try_send(9).unwrap();
        assert!(recv.is_woken());
        assert_eq!(tokio_test::assert_ready!(recv.poll()), Some(9));
    }

    #[tokio::test]
    async fn test_shared_receiver_delivers_each_item_once() {
        let (tx, rx) = stream(8);
        let shared = rx.into_shared();
        for i in 0..8 {
            tx.send(i).await.unwrap();
        }
        drop(tx);

        let a = shared.clone();
        let b = shared.clone();
        let ja = tokio::spawn(async move {
            let mut items = Vec::new();
            while let Some(i) = a.recv().await {
                items.push(i);
            }
            items
        });
        let jb = tokio::spawn(async move {
            let mut items = Vec::new();
            while let Some(i) = b.recv().await {
                items.push(i);
            }
            items
        });

        let mut all = ja.await.unwrap();
        all.extend(jb.await.unwrap());
        all.sort_unstable();
        assert_eq!(all, (0..8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_zero_capacity_clamped() {
        let (tx, mut rx) = stream(0);
        tx.send(1).await.unwrap();
        assert_eq!(rx.recv().await, Some(1));
    }
}
