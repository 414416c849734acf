//! # Concurrency Limiter
//!
//! Limita il numero di job per asset in esecuzione contemporanea.
//!
//! ## Regole:
//! - Con worker pool: `N = min(cache miss, dimensione del pool)`
//! - Senza pool (o `N = 0`): nessun limite
//! - I task in eccesso aspettano in coda FIFO (il semaforo di tokio è fair)
//! - `run_all` restituisce l'esito di ogni task, nello stesso ordine di input

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ConcurrencyLimiter {
    semaphore: Option<Arc<Semaphore>>,
    limit: usize,
}

impl ConcurrencyLimiter {
    /// `0` means unbounded
    pub fn new(limit: usize) -> Self {
        Self {
            semaphore: (limit > 0).then(|| Arc::new(Semaphore::new(limit))),
            limit,
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Limit for one build: pool size capped by the number of cache misses
    pub fn for_build(pool_size: Option<usize>, misses: usize) -> Self {
        let limiter = match pool_size {
            Some(size) if size > 0 => Self::new(size.min(misses)),
            _ => Self::unbounded(),
        };
        debug!("Concurrency limit: {:?}", limiter.limit());
        limiter
    }

    /// `None` when unbounded
    pub fn limit(&self) -> Option<usize> {
        (self.limit > 0).then_some(self.limit)
    }

    /// Run `task` once a slot is free
    pub async fn schedule<F: Future>(&self, task: F) -> F::Output {
        let _permit = match &self.semaphore {
            // The semaphore is never closed, so acquisition only waits
            Some(semaphore) => semaphore.clone().acquire_owned().await.ok(),
            None => None,
        };
        task.await
    }

    /// Schedule every task and wait until all of them have settled
    pub async fn run_all<I, F>(&self, tasks: I) -> Vec<F::Output>
    where
        I: IntoIterator<Item = F>,
        F: Future,
    {
        join_all(tasks.into_iter().map(|task| self.schedule(task))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct InFlight {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl InFlight {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }

        async fn job(&self, value: usize) -> usize {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            value * 10
        }
    }

    #[tokio::test]
    async fn test_bounded_run_never_exceeds_limit() {
        let tracker = InFlight::new();
        let limiter = ConcurrencyLimiter::new(2);

        let results = limiter
            .run_all((0..6).map(|i| {
                let tracker = tracker.clone();
                async move { tracker.job(i).await }
            }))
            .await;

        assert_eq!(results, vec![0, 10, 20, 30, 40, 50]);
        assert_eq!(tracker.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unbounded_runs_everything_at_once() {
        let tracker = InFlight::new();
        let limiter = ConcurrencyLimiter::new(0);
        assert_eq!(limiter.limit(), None);

        let results = limiter
            .run_all((0..5).map(|i| {
                let tracker = tracker.clone();
                async move { tracker.job(i).await }
            }))
            .await;

        assert_eq!(results.len(), 5);
        assert_eq!(tracker.peak.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_failures_are_returned_not_dropped() {
        let limiter = ConcurrencyLimiter::new(1);
        let results: Vec<Result<usize, String>> = limiter
            .run_all((0..3).map(|i| async move {
                if i == 1 {
                    Err(format!("job {} failed", i))
                } else {
                    Ok(i)
                }
            }))
            .await;

        assert_eq!(results, vec![Ok(0), Err("job 1 failed".to_string()), Ok(2)]);
    }

    #[test]
    fn test_for_build_sizing() {
        assert_eq!(ConcurrencyLimiter::for_build(Some(3), 1).limit(), Some(1));
        assert_eq!(ConcurrencyLimiter::for_build(Some(3), 10).limit(), Some(3));
        assert_eq!(ConcurrencyLimiter::for_build(None, 10).limit(), None);
        assert_eq!(ConcurrencyLimiter::for_build(Some(0), 10).limit(), None);
    }
}
