//! Cancellation scope shared by every unit of a pipeline run.

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// A callback type for cancellation notifications.
pub type CancelCallback = Box<dyn Fn() + Send + Sync>;

/// Why a scope tripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelCause {
    /// Explicit cancellation with a caller-supplied reason.
    Cancelled(String),
    /// The scope's deadline elapsed.
    DeadlineExceeded,
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled(reason) => write!(f, "cancelled: {reason}"),
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

/// A one-way cancellation and deadline signal.
///
/// Every long-lived unit of a run holds a reference to exactly one scope for
/// its entire lifetime. Tripping is permanent and idempotent - only the first
/// cause is kept. Producers treat the signal as advisory (stop producing);
/// consumers treat it as mandatory (stop consuming and exit).
#[derive(Default)]
pub struct CancelScope {
    /// Whether the scope has tripped.
    tripped: AtomicBool,
    /// The cause of the trip (first one wins).
    cause: RwLock<Option<CancelCause>>,
    /// Callbacks to invoke when the scope trips.
    callbacks: RwLock<Vec<CancelCallback>>,
    /// Wakes every unit parked in [`CancelScope::cancelled`].
    notify: Notify,
}

impl CancelScope {
    /// Creates a new scope with no deadline.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a scope that trips with [`CancelCause::DeadlineExceeded`]
    /// after `deadline` elapses.
    ///
    /// Must be called within a Tokio runtime; the timer is a spawned task
    /// holding only a weak reference, so an unused scope is still dropped.
    #[must_use]
    pub fn with_deadline(deadline: Duration) -> Arc<Self> {
        let scope = Self::new();
        let weak: Weak<Self> = Arc::downgrade(&scope);
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            if let Some(scope) = weak.upgrade() {
                scope.trip(CancelCause::DeadlineExceeded);
            }
        });
        scope
    }

    /// Requests cancellation with a reason.
    ///
    /// Idempotent - a scope that already tripped keeps its first cause.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.trip(CancelCause::Cancelled(reason.into()));
    }

    fn trip(&self, cause: CancelCause) {
        {
            let mut slot = self.cause.write();
            if slot.is_some() {
                return;
            }
            debug!(%cause, "cancel scope tripped");
            *slot = Some(cause);
            // The flag flips only after the cause is in place, so a unit
            // that observes is_cancelled() always finds err() populated.
            self.tripped.store(true, Ordering::SeqCst);
        }

        let callbacks = self.callbacks.read();
        for callback in callbacks.iter() {
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback();
            })) {
                warn!("cancellation callback panicked: {:?}", e);
            }
        }
        drop(callbacks);

        self.notify.notify_waiters();
    }

    /// Registers a callback to be invoked when the scope trips.
    ///
    /// If already tripped, the callback is invoked immediately.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self.is_cancelled() {
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback();
            })) {
                warn!("cancellation callback panicked: {:?}", e);
            }
        } else {
            self.callbacks.write().push(Box::new(callback));
        }
    }

    /// Returns whether the scope has tripped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    /// Returns the cause once tripped, `None` otherwise.
    #[must_use]
    pub fn err(&self) -> Option<CancelCause> {
        self.cause.read().clone()
    }

    /// Resolves when the scope trips; resolves immediately if it already has.
    ///
    /// Every blocking operation in the engine races against this signal so
    /// that a trip is observed within one scheduling quantum.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before re-checking, so a trip between the check and the
        // await cannot be missed.
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

impl fmt::Debug for CancelScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelScope")
            .field("cancelled", &self.is_cancelled())
            .field("cause", &self.err())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::timeout;

    #[test]
    fn test_scope_default_not_cancelled() {
        let scope = CancelScope::new();
        assert!(!scope.is_cancelled());
        assert!(scope.err().is_none());
    }

    #[test]
    fn test_scope_cancel() {
        let scope = CancelScope::new();
        scope.cancel("user requested");

        assert!(scope.is_cancelled());
        assert_eq!(
            scope.err(),
            Some(CancelCause::Cancelled("user requested".to_string()))
        );
    }

    #[test]
    fn test_scope_cancel_idempotent() {
        let scope = CancelScope::new();
        scope.cancel("first reason");
        scope.cancel("second reason");

        // First cause wins
        assert_eq!(
            scope.err(),
            Some(CancelCause::Cancelled("first reason".to_string()))
        );
    }

    #[test]
    fn test_on_cancel_before_trip() {
        let scope = CancelScope::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        scope.on_cancel(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        scope.cancel("test");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_on_cancel_after_trip_runs_immediately() {
        let scope = CancelScope::new();
        scope.cancel("test");

        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        scope.on_cancel(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_panic_suppressed() {
        let scope = CancelScope::new();
        scope.on_cancel(|| {
            panic!("intentional panic");
        });

        scope.cancel("test");
        assert!(scope.is_cancelled());
    }

    #[tokio::test]
    async fn test_cause_is_set_before_flag_is_visible() {
        // A unit that breaks on is_cancelled() must never find err() empty,
        // even when it races the trip from another thread.
        for _ in 0..100 {
            let scope = CancelScope::new();

            let observer = {
                let scope = scope.clone();
                tokio::task::spawn_blocking(move || {
                    while !scope.is_cancelled() {
                        std::hint::spin_loop();
                    }
                    scope.err().is_some()
                })
            };
            let tripper = {
                let scope = scope.clone();
                tokio::task::spawn_blocking(move || scope.cancel("flip"))
            };

            assert!(observer.await.unwrap(), "flag was visible before cause");
            tripper.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let scope = CancelScope::new();

        let waiter = {
            let scope = scope.clone();
            tokio::spawn(async move {
                scope.cancelled().await;
            })
        };

        tokio::task::yield_now().await;
        scope.cancel("wake up");

        timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_resolves_immediately_when_tripped() {
        let scope = CancelScope::new();
        scope.cancel("already");

        timeout(Duration::from_millis(50), scope.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_trips_scope() {
        let scope = CancelScope::with_deadline(Duration::from_millis(100));
        assert!(!scope.is_cancelled());

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(scope.is_cancelled());
        assert_eq!(scope.err(), Some(CancelCause::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_cancel_beats_deadline() {
        let scope = CancelScope::with_deadline(Duration::from_secs(10));
        scope.cancel("early stop");

        tokio::time::sleep(Duration::from_secs(11)).await;

        // The deadline timer fired but the first cause is kept
        assert_eq!(
            scope.err(),
            Some(CancelCause::Cancelled("early stop".to_string()))
        );
    }
}
