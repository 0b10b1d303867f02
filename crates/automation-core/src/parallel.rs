//! Bounded fan-out of independent async jobs.
//!
//! A [`WorkerPool`] runs at most `parallelism` jobs at once. Each job gets
//! a child of the caller's cancellation token. Results are collected in
//! completion order, not input order: callers that need input order must
//! return an index with each result and sort on it.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Boxed future returned by a job.
pub type JobFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A unit of work: receives a cancellation token, yields a result.
pub type Job<T> = Box<dyn FnOnce(CancellationToken) -> JobFuture<T> + Send>;

/// Box an async closure into a [`Job`].
pub fn job<T, F, Fut>(f: F) -> Job<T>
where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    Box::new(move |token| Box::pin(f(token)))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs jobs with a fixed upper bound on concurrency.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    parallelism: usize,
}

impl WorkerPool {
    /// Create a pool; a parallelism of zero is treated as one.
    pub fn new(parallelism: usize) -> Self {
        Self {
            parallelism: parallelism.max(1),
        }
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Run every job and return the results in completion order.
    ///
    /// Once `cancel` fires, workers stop picking up new jobs; jobs already
    /// running observe cancellation through their own token. The returned
    /// vector then holds only the results that were produced.
    pub async fn run<T>(&self, cancel: &CancellationToken, jobs: Vec<Job<T>>) -> Vec<T>
    where
        T: Send + 'static,
    {
        let total = jobs.len();
        let queue = Arc::new(Mutex::new(jobs.into_iter().collect::<VecDeque<_>>()));
        let results = Arc::new(Mutex::new(Vec::with_capacity(total)));

        let mut workers = JoinSet::new();
        for worker in 0..self.parallelism.min(total) {
            let queue = queue.clone();
            let results = results.clone();
            let token = cancel.child_token();
            workers.spawn(async move {
                loop {
                    if token.is_cancelled() {
                        debug!(worker, "worker stopping on cancellation");
                        break;
                    }
                    let Some(next) = lock(&queue).pop_front() else {
                        break;
                    };
                    let value = next(token.clone()).await;
                    lock(&results).push(value);
                }
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "worker task failed");
            }
        }

        let mut results = lock(&results);
        debug!(total, completed = results.len(), "worker pool drained");
        std::mem::take(&mut *results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn twenty_jobs_on_ten_workers() {
        let jobs: Vec<Job<u64>> = (1..=20u64)
            .map(|i| {
                job(move |_token| async move {
                    tokio::time::sleep(Duration::from_millis(20 - i)).await;
                    i
                })
            })
            .collect();

        let results = WorkerPool::new(10).run(&CancellationToken::new(), jobs).await;
        assert_eq!(results.len(), 20);
        assert_eq!(results.iter().sum::<u64>(), 210);
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_limit() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs: Vec<Job<()>> = (0..12)
            .map(|_| {
                let active = active.clone();
                let peak = peak.clone();
                job(move |_token| async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        WorkerPool::new(3).run(&CancellationToken::new(), jobs).await;
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn single_worker_preserves_input_order() {
        let jobs: Vec<Job<usize>> = (0..5).map(|i| job(move |_| async move { i })).collect();
        let results = WorkerPool::new(1).run(&CancellationToken::new(), jobs).await;
        assert_eq!(results, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn cancelled_pool_stops_taking_jobs() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let jobs: Vec<Job<usize>> = (0..5).map(|i| job(move |_| async move { i })).collect();
        let results = WorkerPool::new(2).run(&cancel, jobs).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn jobs_observe_cancellation() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let jobs: Vec<Job<bool>> = vec![job(move |token: CancellationToken| async move {
            trigger.cancel();
            tokio::select! {
                _ = token.cancelled() => true,
                _ = tokio::time::sleep(Duration::from_secs(5)) => false,
            }
        })];
        let results = WorkerPool::new(1).run(&cancel, jobs).await;
        assert_eq!(results, vec![true]);
    }

    #[test]
    fn zero_parallelism_is_one() {
        assert_eq!(WorkerPool::new(0).parallelism(), 1);
    }
}
