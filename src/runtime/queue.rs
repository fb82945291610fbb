//! Bounded drop-oldest queue.
//!
//! All pipeline queues share the same overflow policy: when full, the
//! oldest element is dropped to make room for the newest and a drop
//! counter is incremented. Staleness is worse than loss for alarm
//! evaluation, and the pipeline must never block upstream.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Bounded MPSC queue with drop-oldest overflow semantics.
///
/// `push` is synchronous and never blocks; `pop_timeout` is async and
/// wakes either on arrival or timeout, so consumers stay responsive to
/// shutdown signals.
pub struct BoundedQueue<T> {
    inner: Mutex<VecDeque<T>>,
    capacity: usize,
    notify: Notify,
    dropped: AtomicU64,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` elements
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Push an element, dropping the oldest one on overflow.
    ///
    /// Returns `true` when an element was dropped to make room.
    pub fn push(&self, item: T) -> bool {
        let dropped_oldest = {
            let mut q = self.inner.lock();
            let dropped = if q.len() >= self.capacity {
                q.pop_front();
                true
            } else {
                false
            };
            q.push_back(item);
            dropped
        };
        if dropped_oldest {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.notify.notify_one();
        dropped_oldest
    }

    /// Pop the oldest element without waiting
    pub fn try_pop(&self) -> Option<T> {
        self.inner.lock().pop_front()
    }

    /// Pop the oldest element, waiting up to `timeout` for one to arrive
    pub async fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(item) = self.try_pop() {
                return Some(item);
            }
            let notified = self.notify.notified();
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                // Deadline passed; one last check in case of a race
                // between the final timeout and a concurrent push.
                return self.try_pop();
            }
        }
    }

    /// Current queue depth
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the queue is currently empty
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total elements dropped due to overflow
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_oldest_on_overflow() {
        let q = BoundedQueue::new(3);
        assert!(!q.push(1));
        assert!(!q.push(2));
        assert!(!q.push(3));
        assert!(q.push(4));

        assert_eq!(q.dropped(), 1);
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.try_pop(), Some(3));
        assert_eq!(q.try_pop(), Some(4));
        assert_eq!(q.try_pop(), None);
    }

    #[tokio::test]
    async fn test_pop_timeout_returns_none_when_empty() {
        let q: BoundedQueue<u32> = BoundedQueue::new(4);
        let popped = q.pop_timeout(Duration::from_millis(20)).await;
        assert_eq!(popped, None);
    }

    #[tokio::test]
    async fn test_pop_wakes_on_push() {
        let q = std::sync::Arc::new(BoundedQueue::new(4));
        let q2 = q.clone();
        let waiter = tokio::spawn(async move { q2.pop_timeout(Duration::from_secs(5)).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        q.push(7u32);
        assert_eq!(waiter.await.unwrap(), Some(7));
    }
}
