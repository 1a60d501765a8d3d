//! Queue-based leaky-bucket scheduler.
//!
//! Where the admission-form leaky bucket rejects callers with a delay, this
//! variant accepts jobs into a bounded queue and a background worker drains
//! them at the leak rate, sleeping between dequeues. The sleep is
//! cancellable: shutting the scheduler down wakes the worker immediately.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use wicket_storage::{BoundedQueue, QueueFullError};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Paces queued jobs at `quota / duration` per second.
pub struct LeakyBucketScheduler {
    queue: Arc<BoundedQueue<Job>>,
    shutdown: watch::Sender<bool>,
    worker: tokio::task::JoinHandle<()>,
}

impl LeakyBucketScheduler {
    /// Creates a scheduler leaking `quota` jobs per `duration`, queueing at
    /// most `bucket_size` jobs.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_size` is zero.
    pub fn new(quota: u64, duration: Duration, bucket_size: usize) -> Self {
        let queue = Arc::new(BoundedQueue::new(bucket_size));
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let interval = if quota == 0 {
            Duration::MAX
        } else {
            duration / u32::try_from(quota).unwrap_or(u32::MAX)
        };

        let worker_queue = Arc::clone(&queue);
        let worker = tokio::spawn(async move {
            loop {
                let job = tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    job = worker_queue.get(true, Duration::ZERO) => job,
                };
                let Some(job) = job else { break };
                job.await;

                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        });

        Self {
            queue,
            shutdown,
            worker,
        }
    }

    /// Enqueues a job, failing when the bucket is at capacity.
    pub fn schedule<F>(&self, job: F) -> Result<(), QueueFullError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.queue.put(Box::pin(job))
    }

    /// Number of jobs waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Stops the worker; queued jobs that have not started are dropped.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.worker.await;
    }
}
