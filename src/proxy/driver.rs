//! Phase driver running one task per work item and joining them all
//!
//! Every task of a phase is launched up front; `run` returns only after the
//! last one finished, which gives the barrier between fetching and checking.
//! With a concurrency limit, a task finding no free slot waits one retry
//! delay, then queues for the next slot instead of being dropped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Default cap on in-flight tasks per phase
pub const DEFAULT_CONCURRENCY: usize = 256;

/// Runs a phase of independent tasks to completion
#[derive(Debug, Clone)]
pub struct PhaseDriver {
    slots: Option<Arc<Semaphore>>,
    retry_delay: Duration,
}

impl PhaseDriver {
    /// One in-flight task per item, no limit
    pub fn unbounded(retry_delay: Duration) -> Self {
        Self {
            slots: None,
            retry_delay,
        }
    }

    /// At most `limit` tasks in flight at a time
    pub fn bounded(limit: usize, retry_delay: Duration) -> Self {
        Self {
            slots: Some(Arc::new(Semaphore::new(limit.max(1)))),
            retry_delay,
        }
    }

    /// Bounded by `limit`, or unbounded when `limit` is zero
    pub fn new(limit: usize, retry_delay: Duration) -> Self {
        match limit {
            0 => Self::unbounded(retry_delay),
            limit => Self::bounded(limit, retry_delay),
        }
    }

    /// Run every task and collect the outputs, in completion order.
    ///
    /// A task that panics is logged and contributes no output.
    pub async fn run<T, F>(&self, phase: &str, tasks: Vec<F>) -> Vec<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let total = tasks.len();
        debug!(phase, "launching {} tasks", total);

        let mut set = JoinSet::new();
        for task in tasks {
            let slots = self.slots.clone();
            let retry_delay = self.retry_delay;
            set.spawn(async move {
                let _permit = match slots {
                    Some(slots) => admit(slots, retry_delay).await,
                    None => None,
                };
                task.await
            });
        }

        let mut outputs = Vec::with_capacity(total);
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(output) => outputs.push(output),
                Err(e) => error!(phase, "task failed: {}", e),
            }
        }

        debug!(phase, "{} of {} tasks finished", outputs.len(), total);
        outputs
    }
}

/// Take a slot, retrying once after `retry_delay` when none is free
async fn admit(slots: Arc<Semaphore>, retry_delay: Duration) -> Option<OwnedSemaphorePermit> {
    match Arc::clone(&slots).try_acquire_owned() {
        Ok(permit) => return Some(permit),
        Err(TryAcquireError::Closed) => return None,
        Err(TryAcquireError::NoPermits) => {}
    }

    tokio::time::sleep(retry_delay).await;
    slots.acquire_owned().await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[tokio::test]
    async fn test_runs_every_task() {
        let driver = PhaseDriver::unbounded(Duration::from_millis(10));
        let tasks: Vec<_> = (0..50).map(|i| async move { i * 2 }).collect();

        let mut outputs = driver.run("test", tasks).await;
        outputs.sort_unstable();
        assert_eq!(outputs, (0..50).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_unbounded_runs_in_parallel() {
        let driver = PhaseDriver::unbounded(Duration::from_millis(10));
        let tasks: Vec<_> = (0..20)
            .map(|_| async { tokio::time::sleep(Duration::from_millis(200)).await })
            .collect();

        let start = Instant::now();
        driver.run("test", tasks).await;
        // Wall clock follows the slowest task, not the sum.
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_bounded_never_drops_tasks() {
        let driver = PhaseDriver::bounded(2, Duration::from_millis(5));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..10)
            .map(|i| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    i
                }
            })
            .collect();

        let outputs = driver.run("test", tasks).await;
        assert_eq!(outputs.len(), 10);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_waiting_task_sleeps_retry_delay() {
        let retry_delay = Duration::from_millis(300);
        let driver = PhaseDriver::bounded(1, retry_delay);
        let tasks: Vec<_> = (0..2)
            .map(|_| async { tokio::time::sleep(Duration::from_millis(10)).await })
            .collect();

        let start = Instant::now();
        let outputs = driver.run("test", tasks).await;
        assert_eq!(outputs.len(), 2);
        // The second task found the only slot taken.
        assert!(start.elapsed() >= retry_delay);
    }

    #[tokio::test]
    async fn test_zero_limit_is_unbounded() {
        let driver = PhaseDriver::new(0, Duration::from_secs(5));
        let tasks: Vec<_> = (0..20)
            .map(|_| async { tokio::time::sleep(Duration::from_millis(200)).await })
            .collect();

        let start = Instant::now();
        driver.run("test", tasks).await;
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    async fn fail_on_two(i: u8) -> u8 {
        if i == 2 {
            panic!("boom");
        }
        i
    }

    #[tokio::test]
    async fn test_panicking_task_is_skipped() {
        let driver = PhaseDriver::unbounded(Duration::from_millis(10));
        let tasks: Vec<_> = (1..=3).map(fail_on_two).collect();

        let mut outputs = driver.run("test", tasks).await;
        outputs.sort_unstable();
        assert_eq!(outputs, vec![1, 3]);
    }
}
