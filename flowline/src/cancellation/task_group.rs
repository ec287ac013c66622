//! Task group for tracking a run's spawned units.

use super::CancelScope;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A group of logical units sharing one cancellation scope.
///
/// Every source, stage, distributor, merger forwarder, and pool worker of a
/// run is spawned through its group. Cancellation signals intent only; the
/// group's [`wait`](TaskGroup::wait) is what guarantees every unit has
/// actually exited before the run reports termination.
pub struct TaskGroup {
    /// The cancellation scope shared by all units in the group.
    scope: Arc<CancelScope>,
    /// Handles to spawned units, with their names.
    handles: Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl TaskGroup {
    /// Creates a new task group around a scope.
    #[must_use]
    pub fn new(scope: Arc<CancelScope>) -> Self {
        Self {
            scope,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Returns the group's cancellation scope.
    #[must_use]
    pub fn scope(&self) -> &Arc<CancelScope> {
        &self.scope
    }

    /// Spawns a unit in the group.
    pub fn spawn<F>(&self, name: impl Into<String>, unit: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        debug!(unit = %name, "spawning pipeline unit");
        let handle = tokio::spawn(unit);
        self.handles.lock().push((name, handle));
    }

    /// Trips the scope for every unit in the group.
    pub fn cancel_all(&self, reason: impl Into<String>) {
        self.scope.cancel(reason);
    }

    /// Waits for every spawned unit to exit.
    ///
    /// A panicked unit trips the scope so its siblings unwind too; the panic
    /// is logged, not propagated.
    pub async fn wait(&self) {
        let handles: Vec<_> = {
            let mut lock = self.handles.lock();
            std::mem::take(&mut *lock)
        };

        for (name, handle) in handles {
            if let Err(join_error) = handle.await {
                warn!(unit = %name, error = %join_error, "pipeline unit terminated abnormally");
                self.scope.cancel(format!("unit '{name}' terminated abnormally"));
            }
        }
    }

    /// Returns the number of units not yet waited on.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.handles.lock().len()
    }
}

impl std::fmt::Debug for TaskGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGroup")
            .field("task_count", &self.task_count())
            .field("cancelled", &self.scope.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_group_waits_for_all_units() {
        let group = TaskGroup::new(CancelScope::new());
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let counter = counter.clone();
            group.spawn("unit", async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(group.task_count(), 4);
        group.wait().await;
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert_eq!(group.task_count(), 0);
    }

    #[tokio::test]
    async fn test_panicked_unit_trips_scope() {
        let group = TaskGroup::new(CancelScope::new());

        group.spawn("doomed", async {
            panic!("unit blew up");
        });

        group.wait().await;
        assert!(group.scope().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_all_unblocks_units() {
        let group = TaskGroup::new(CancelScope::new());
        let scope = group.scope().clone();

        group.spawn("parked", async move {
            scope.cancelled().await;
        });

        group.cancel_all("shutting down");

        tokio::time::timeout(Duration::from_secs(1), group.wait())
            .await
            .unwrap();
    }
}
