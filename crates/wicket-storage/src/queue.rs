//! Bounded FIFO queue used by the queue-based leaky-bucket scheduler.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

/// Returned by [`BoundedQueue::put`] when the queue is at capacity.
#[derive(Debug, Clone, Error)]
#[error("queue is full ({capacity} items)")]
pub struct QueueFullError {
    /// The queue's fixed capacity.
    pub capacity: usize,
}

/// FIFO queue with a fixed capacity.
///
/// `put` never blocks; it fails with [`QueueFullError`] at capacity.
/// `get` can wait with an optional timeout.
pub struct BoundedQueue<T> {
    tx: mpsc::Sender<T>,
    rx: Mutex<mpsc::Receiver<T>>,
    len: Arc<AtomicUsize>,
    capacity: usize,
}

impl<T: Send> BoundedQueue<T> {
    /// Creates a queue holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
            len: Arc::new(AtomicUsize::new(0)),
            capacity,
        }
    }

    /// Enqueues `item`, failing immediately when the queue is full.
    pub fn put(&self, item: T) -> Result<(), QueueFullError> {
        match self.tx.try_send(item) {
            Ok(()) => {
                self.len.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(QueueFullError {
                capacity: self.capacity,
            }),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(QueueFullError {
                capacity: self.capacity,
            }),
        }
    }

    /// Dequeues the head item.
    ///
    /// With `block = false` returns immediately; otherwise waits up to
    /// `timeout` (forever when `timeout` is zero). Returns `None` when
    /// nothing arrived in time.
    pub async fn get(&self, block: bool, timeout: Duration) -> Option<T> {
        let mut rx = self.rx.lock().await;
        let item = if !block {
            rx.try_recv().ok()
        } else if timeout.is_zero() {
            rx.recv().await
        } else {
            match tokio::time::timeout(timeout, rx.recv()).await {
                Ok(item) => item,
                Err(_) => None,
            }
        };
        if item.is_some() {
            self.len.fetch_sub(1, Ordering::SeqCst);
        }
        item
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    /// Whether the queue holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The queue's fixed capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fifo_order() {
        let queue = BoundedQueue::new(3);
        queue.put(1).unwrap();
        queue.put(2).unwrap();
        queue.put(3).unwrap();

        assert_eq!(queue.get(false, Duration::ZERO).await, Some(1));
        assert_eq!(queue.get(false, Duration::ZERO).await, Some(2));
        assert_eq!(queue.get(false, Duration::ZERO).await, Some(3));
        assert_eq!(queue.get(false, Duration::ZERO).await, None);
    }

    #[tokio::test]
    async fn put_fails_at_capacity() {
        let queue = BoundedQueue::new(2);
        queue.put("a").unwrap();
        queue.put("b").unwrap();

        let err = queue.put("c").unwrap_err();
        assert_eq!(err.capacity, 2);
        assert_eq!(queue.len(), 2);

        // Draining one slot makes room again.
        assert_eq!(queue.get(false, Duration::ZERO).await, Some("a"));
        queue.put("c").unwrap();
    }

    #[tokio::test]
    async fn blocking_get_times_out() {
        let queue: BoundedQueue<u8> = BoundedQueue::new(1);
        let got = queue.get(true, Duration::from_millis(20)).await;
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn blocking_get_wakes_on_put() {
        let queue = Arc::new(BoundedQueue::new(1));
        let reader = Arc::clone(&queue);
        let handle =
            tokio::spawn(async move { reader.get(true, Duration::from_secs(5)).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.put(42).unwrap();
        assert_eq!(handle.await.unwrap(), Some(42));
    }
}
