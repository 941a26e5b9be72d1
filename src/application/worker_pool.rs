//! Bounded worker pool.
//!
//! A fixed number of worker tasks drain a bounded job queue. Each worker runs
//! its jobs inside a `worker` span whose `name` field is `<pool>-<n>`, so every
//! log line emitted by an agent names the worker that ran it. An optional
//! governor quota caps how many jobs start per second across the pool.
//!
//! Jobs queued with [`WorkerPool::spawn`] are abortable: [`PoolTask::abort`]
//! stops the job at its next await point, and awaiting the task afterwards
//! returns only once the job's future has been dropped.

use futures::future::{AbortHandle, Abortable, Aborted};
use futures::FutureExt;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::future::Future;
use std::num::NonZeroU32;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info_span, Instrument};

use crate::domain::errors::{DomainError, DomainResult};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Sizing of a worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Prefix of the worker names.
    pub name: String,
    /// Number of workers, so the number of jobs running at once.
    pub pool_size: usize,
    /// Jobs that may wait for a worker before `submit` blocks.
    pub queue_capacity: usize,
    /// Cap on job starts per second across the pool.
    pub max_jobs_per_second: Option<u32>,
}

impl WorkerPoolConfig {
    /// Unthrottled pool of `pool_size` workers.
    pub fn new(name: impl Into<String>, pool_size: usize, queue_capacity: usize) -> Self {
        Self {
            name: name.into(),
            pool_size,
            queue_capacity,
            max_jobs_per_second: None,
        }
    }

    /// Cap job starts per second; `None` removes the cap.
    pub fn with_rate_limit(mut self, max_jobs_per_second: Option<u32>) -> Self {
        self.max_jobs_per_second = max_jobs_per_second;
        self
    }
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPoolStats {
    /// Jobs running right now.
    pub active: usize,
    /// Jobs that ran to completion or were aborted.
    pub completed: u64,
    /// Jobs that panicked.
    pub panicked: u64,
}

#[derive(Default)]
struct Counters {
    active: AtomicUsize,
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// Handle on a job queued with [`WorkerPool::spawn`].
///
/// Awaiting it yields the job's output once the job has ended. Dropping it
/// aborts the job.
pub struct PoolTask<T> {
    pool: String,
    abort: AbortHandle,
    result: oneshot::Receiver<Result<T, Aborted>>,
}

impl<T> PoolTask<T> {
    /// Stop the job at its next await point. A job still queued never starts.
    ///
    /// Await the task to know when the job has actually stopped.
    pub fn abort(&self) {
        self.abort.abort();
    }
}

impl<T> Future for PoolTask<T> {
    type Output = DomainResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.result).poll(cx).map(|received| match received {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(Aborted)) => Err(DomainError::Cancelled(format!(
                "job on pool {} was aborted",
                this.pool
            ))),
            Err(_) => Err(DomainError::Panicked(format!(
                "job on pool {} did not complete",
                this.pool
            ))),
        })
    }
}

impl<T> Drop for PoolTask<T> {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

/// Fixed set of workers draining a bounded queue of jobs.
pub struct WorkerPool {
    name: String,
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl WorkerPool {
    /// Spawn the workers. Must be called from within a tokio runtime.
    pub fn new(config: WorkerPoolConfig) -> Self {
        let pool_size = config.pool_size.max(1);
        let (tx, rx) = mpsc::channel::<Job>(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let counters = Arc::new(Counters::default());
        let limiter = config
            .max_jobs_per_second
            .and_then(NonZeroU32::new)
            .map(|rate| Arc::new(RateLimiter::direct(Quota::per_second(rate))));

        let workers = (0..pool_size)
            .map(|n| {
                let worker_name = format!("{}-{n}", config.name);
                let span = info_span!("worker", name = %worker_name);
                tokio::spawn(
                    worker_loop(Arc::clone(&rx), limiter.clone(), Arc::clone(&counters))
                        .instrument(span),
                )
            })
            .collect();

        debug!(pool = %config.name, pool_size, queue_capacity = config.queue_capacity, "Worker pool started");

        Self {
            name: config.name,
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            counters,
        }
    }

    /// Name the workers are prefixed with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a job, waiting for queue space if the queue is full.
    pub async fn submit<F>(&self, job: F) -> DomainResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let sender = self
            .sender
            .lock()
            .await
            .clone()
            .ok_or_else(|| DomainError::PoolClosed(self.name.clone()))?;
        sender
            .send(Box::pin(job))
            .await
            .map_err(|_| DomainError::PoolClosed(self.name.clone()))
    }

    /// Queue an abortable job, waiting for queue space if the queue is full.
    pub async fn spawn<F, T>(&self, job: F) -> DomainResult<PoolTask<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (abort, registration) = AbortHandle::new_pair();
        let (tx, rx) = oneshot::channel();
        self.submit(async move {
            // The job future is dropped before the outcome is sent.
            let outcome = Abortable::new(job, registration).await;
            let _ = tx.send(outcome);
        })
        .await?;
        Ok(PoolTask {
            pool: self.name.clone(),
            abort,
            result: rx,
        })
    }

    /// Run a job on the pool and wait for its output.
    ///
    /// A panic inside the job surfaces as `DomainError::Panicked`. Dropping
    /// the returned future aborts the job.
    pub async fn run<F, T>(&self, job: F) -> DomainResult<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.spawn(job).await?.await
    }

    /// Current counters.
    pub fn stats(&self) -> WorkerPoolStats {
        WorkerPoolStats {
            active: self.counters.active.load(Ordering::Acquire),
            completed: self.counters.completed.load(Ordering::Acquire),
            panicked: self.counters.panicked.load(Ordering::Acquire),
        }
    }

    /// Stop accepting jobs, let queued jobs finish and wait for the workers.
    pub async fn shutdown(&self) {
        self.sender.lock().await.take();
        let workers: Vec<JoinHandle<()>> = self.workers.lock().await.drain(..).collect();
        for worker in workers {
            if let Err(e) = worker.await {
                error!(pool = %self.name, error = %e, "Worker task ended abnormally");
            }
        }
        debug!(pool = %self.name, "Worker pool stopped");
    }
}

async fn worker_loop(
    rx: Arc<Mutex<mpsc::Receiver<Job>>>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
    counters: Arc<Counters>,
) {
    loop {
        let job = rx.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };
        if let Some(limiter) = &limiter {
            limiter.until_ready().await;
        }

        counters.active.fetch_add(1, Ordering::AcqRel);
        let outcome = AssertUnwindSafe(job).catch_unwind().await;
        counters.active.fetch_sub(1, Ordering::AcqRel);

        match outcome {
            Ok(()) => {
                counters.completed.fetch_add(1, Ordering::AcqRel);
            }
            Err(_) => {
                counters.panicked.fetch_add(1, Ordering::AcqRel);
                error!("Job panicked, worker continues");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_returns_job_output() {
        let pool = WorkerPool::new(WorkerPoolConfig::new("test", 2, 8));
        let value = pool.run(async { 21 * 2 }).await.unwrap();
        assert_eq!(value, 42);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded_by_pool_size() {
        let pool = Arc::new(WorkerPool::new(WorkerPoolConfig::new("bounded", 2, 16)));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut waits = Vec::new();
        for _ in 0..8 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let pool = Arc::clone(&pool);
            waits.push(tokio::spawn(async move {
                pool.run(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }));
        }
        for wait in waits {
            wait.await.unwrap().unwrap();
        }

        pool.shutdown().await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.stats().completed, 8);
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_kill_worker() {
        let pool = WorkerPool::new(WorkerPoolConfig::new("panics", 1, 4));
        let err = pool
            .run(async {
                panic!("agent bug");
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Panicked(_)));

        assert_eq!(pool.run(async { "still alive" }).await.unwrap(), "still alive");
        assert_eq!(pool.stats().panicked, 1);
        pool.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_job_stops_before_task_resolves() {
        let pool = WorkerPool::new(WorkerPoolConfig::new("abort", 1, 4));
        let running = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));

        let task = {
            let running = Arc::clone(&running);
            let finished = Arc::clone(&finished);
            pool.spawn(async move {
                running.fetch_add(1, Ordering::SeqCst);
                let _running = RunningGuard(Arc::clone(&running));
                tokio::time::sleep(Duration::from_secs(60)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap()
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(running.load(Ordering::SeqCst), 1);

        task.abort();
        let err = task.await.unwrap_err();
        assert!(matches!(err, DomainError::Cancelled(_)));
        assert_eq!(running.load(Ordering::SeqCst), 0, "job dropped before the task resolved");
        assert_eq!(finished.load(Ordering::SeqCst), 0);
        pool.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_run_aborts_job() {
        let pool = WorkerPool::new(WorkerPoolConfig::new("drop", 1, 4));
        let finished = Arc::new(AtomicUsize::new(0));
        let job = {
            let finished = Arc::clone(&finished);
            async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            }
        };

        let timed_out = tokio::time::timeout(Duration::from_secs(1), pool.run(job)).await;
        assert!(timed_out.is_err());
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(finished.load(Ordering::SeqCst), 0);
        assert_eq!(pool.stats().active, 0);
        pool.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_job_aborted_never_starts() {
        let pool = WorkerPool::new(WorkerPoolConfig::new("queued", 1, 4));
        let started = Arc::new(AtomicUsize::new(0));

        let busy = pool
            .spawn(tokio::time::sleep(Duration::from_secs(5)))
            .await
            .unwrap();
        let queued = {
            let started = Arc::clone(&started);
            pool.spawn(async move {
                started.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap()
        };

        queued.abort();
        busy.await.unwrap();
        assert!(matches!(queued.await, Err(DomainError::Cancelled(_))));
        assert_eq!(started.load(Ordering::SeqCst), 0);
        pool.shutdown().await;
    }

    /// Decrements its counter when the job holding it is dropped.
    struct RunningGuard(Arc<AtomicUsize>);

    impl Drop for RunningGuard {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let pool = WorkerPool::new(WorkerPoolConfig::new("closed", 1, 4));
        pool.shutdown().await;
        let err = pool.submit(async {}).await.unwrap_err();
        assert!(matches!(err, DomainError::PoolClosed(name) if name == "closed"));
    }
}
