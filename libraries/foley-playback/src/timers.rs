//! Cancellable delayed tasks

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{sleep_until, Instant};

#[derive(Default)]
struct Pending {
    next_id: u64,
    tasks: HashMap<u64, AbortHandle>,
}

/// Live timer handles of one component
///
/// A timer leaves the set as soon as its deadline passes, so `clear` only
/// aborts timers that have not fired yet.
#[derive(Clone, Default)]
pub struct TimerSet {
    pending: Arc<Mutex<Pending>>,
}

impl std::fmt::Debug for TimerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerSet")
            .field("pending", &self.len())
            .finish()
    }
}

impl TimerSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `task` on `runtime` once `deadline` is reached
    pub fn schedule_at<F>(&self, runtime: &Handle, deadline: Instant, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // Lock spans the spawn so a timer that fires immediately cannot
        // remove itself before it was registered
        let mut pending = self.pending();
        let id = pending.next_id;
        pending.next_id += 1;

        let set = self.clone();
        let handle = runtime.spawn(async move {
            sleep_until(deadline).await;
            set.pending().tasks.remove(&id);
            task.await;
        });
        pending.tasks.insert(id, handle.abort_handle());
    }

    /// Run `task` on `runtime` after `delay`
    pub fn schedule_after<F>(&self, runtime: &Handle, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.schedule_at(runtime, Instant::now() + delay, task);
    }

    /// Abort every timer that has not fired
    pub fn clear(&self) {
        let tasks: Vec<AbortHandle> = self.pending().tasks.drain().map(|(_, h)| h).collect();
        for task in tasks {
            task.abort();
        }
    }

    /// Timers waiting for their deadline
    pub fn len(&self) -> usize {
        self.pending().tasks.len()
    }

    /// Whether no timer is waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn fires_in_deadline_order() {
        let timers = TimerSet::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let runtime = Handle::current();

        for (delay, tag) in [(300, 'c'), (100, 'a'), (200, 'b')] {
            let order = Arc::clone(&order);
            timers.schedule_after(&runtime, Duration::from_millis(delay), async move {
                order.lock().unwrap().push(tag);
            });
        }
        assert_eq!(timers.len(), 3);

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(*order.lock().unwrap(), vec!['a', 'b', 'c']);
        assert!(timers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_aborts_pending() {
        let timers = TimerSet::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let runtime = Handle::current();

        for delay in [100, 500] {
            let hits = Arc::clone(&hits);
            timers.schedule_after(&runtime, Duration::from_millis(delay), async move {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        timers.clear();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(timers.is_empty());
    }
}
