//! Component H: the bounded-concurrency background task group, used for
//! write-behind pushes to the remote tier, and the expiration timer queue
//! used by the memory tier.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::time::DelayQueue;

/// A bounded-parallelism executor for background work (remote write-behind).
///
/// Submitting a task never blocks the submitter indefinitely — it blocks
/// only until a slot frees, which is fine because remote writes are
/// rate-limited by the semaphore's own width, not by an unbounded queue.
#[derive(Debug, Clone)]
pub struct TaskGroup {
    semaphore: Arc<Semaphore>,
}

impl TaskGroup {
    /// Builds a task group with room for `concurrency` tasks in flight.
    /// Defaults to the host's available parallelism when `concurrency` is
    /// `None`, matching the "ceiling sized to the CPU count" requirement.
    pub fn new(concurrency: Option<usize>) -> Self {
        let n = concurrency
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
            .max(1);
        Self { semaphore: Arc::new(Semaphore::new(n)) }
    }

    /// Spawns `task` once a concurrency slot is available. The returned
    /// `JoinHandle` is discarded by callers that don't need to await
    /// completion; the task still runs to completion independently.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let semaphore = self.semaphore.clone();
        tokio::spawn(async move {
            // The background pool outlives any single request's cancellation;
            // acquiring here (rather than in the caller) keeps a cancelled
            // request from blocking on pool capacity before this task exists.
            let permit = semaphore.acquire_owned().await;
            task.await;
            drop(permit);
        });
    }
}

type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// A `(fireAt, callback)` timer queue with a single dispatcher driving
/// callbacks in monotonic time order off a real (tokio) monotonic clock.
#[derive(Debug, Clone)]
pub struct TimerQueue {
    tx: mpsc::UnboundedSender<(Duration, TimerCallback)>,
}

impl TimerQueue {
    /// Spawns the dispatcher task and returns a handle to schedule against
    /// it.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(dispatch(rx));
        Self { tx }
    }

    /// Schedules `callback` to fire after `delay`. Callbacks must tolerate
    /// running against state that has since changed identity (the queue has
    /// no cancellation); see the memory cache's generation-counter guard.
    pub fn schedule(&self, delay: Duration, callback: impl FnOnce() + Send + 'static) {
        // The dispatcher task only stops if its receiver is dropped, which
        // only happens if this TimerQueue (and every clone) has already
        // been dropped — in which case there's nothing to schedule against.
        let _ = self.tx.send((delay, Box::new(callback)));
    }
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

async fn dispatch(mut rx: mpsc::UnboundedReceiver<(Duration, TimerCallback)>) {
    let mut queue: DelayQueue<TimerCallback> = DelayQueue::new();
    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Some((delay, callback)) => {
                        queue.insert(callback, delay);
                    }
                    None => break,
                }
            }
            Some(expired) = queue.next(), if !queue.is_empty() => {
                expired.into_inner()();
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn task_group_runs_submitted_work() {
        let group = TaskGroup::new(Some(2));
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let counter = counter.clone();
            group.spawn(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_queue_fires_callback_after_delay() {
        let queue = TimerQueue::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = fired.clone();
        queue.schedule(Duration::from_secs(30), move || {
            fired2.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_queue_fires_in_monotonic_order() {
        let queue = TimerQueue::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for (label, delay) in [("c", 30), ("a", 5), ("b", 10)] {
            let order = order.clone();
            queue.schedule(Duration::from_secs(delay), move || {
                order.lock().unwrap().push(label);
            });
        }
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }
}
